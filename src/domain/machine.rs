use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// The six embroidery machine/format combinations a product may carry a
/// design file for. The set is closed: anything else is rejected at the
/// request boundary instead of being repaired on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(try_from = "String", into = "String")]
pub enum MachineType {
    BrotherPes,
    TajimaDst,
    JanomeJef,
    MelcoExp,
    HusqvarnaVp3,
    SingerXxx,
}

impl MachineType {
    pub const ALL: [MachineType; 6] = [
        MachineType::BrotherPes,
        MachineType::TajimaDst,
        MachineType::JanomeJef,
        MachineType::MelcoExp,
        MachineType::HusqvarnaVp3,
        MachineType::SingerXxx,
    ];

    /// Stable identifier used in the API and in `product_design_files`.
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineType::BrotherPes => "brother-pes",
            MachineType::TajimaDst => "tajima-dst",
            MachineType::JanomeJef => "janome-jef",
            MachineType::MelcoExp => "melco-exp",
            MachineType::HusqvarnaVp3 => "husqvarna-vp3",
            MachineType::SingerXxx => "singer-xxx",
        }
    }

    /// File extension of the machine format, used when naming attachments.
    pub fn extension(&self) -> &'static str {
        match self {
            MachineType::BrotherPes => "pes",
            MachineType::TajimaDst => "dst",
            MachineType::JanomeJef => "jef",
            MachineType::MelcoExp => "exp",
            MachineType::HusqvarnaVp3 => "vp3",
            MachineType::SingerXxx => "xxx",
        }
    }
}

impl fmt::Display for MachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MachineType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brother-pes" => Ok(MachineType::BrotherPes),
            "tajima-dst" => Ok(MachineType::TajimaDst),
            "janome-jef" => Ok(MachineType::JanomeJef),
            "melco-exp" => Ok(MachineType::MelcoExp),
            "husqvarna-vp3" => Ok(MachineType::HusqvarnaVp3),
            "singer-xxx" => Ok(MachineType::SingerXxx),
            other => Err(DomainError::InvalidInput(format!(
                "unknown machine type '{other}'"
            ))),
        }
    }
}

impl TryFrom<String> for MachineType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse().map_err(|e: DomainError| e.to_string())
    }
}

impl From<MachineType> for String {
    fn from(m: MachineType) -> String {
        m.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_round_trip() {
        for m in MachineType::ALL {
            assert_eq!(m.as_str().parse::<MachineType>().unwrap(), m);
        }
    }

    #[test]
    fn unknown_identifier_is_rejected() {
        assert!("brother.pes".parse::<MachineType>().is_err());
        assert!("BrotherPes".parse::<MachineType>().is_err());
        assert!("".parse::<MachineType>().is_err());
    }

    #[test]
    fn serde_uses_the_identifier_form() {
        let json = serde_json::to_string(&MachineType::TajimaDst).unwrap();
        assert_eq!(json, "\"tajima-dst\"");
        let back: MachineType = serde_json::from_str("\"husqvarna-vp3\"").unwrap();
        assert_eq!(back, MachineType::HusqvarnaVp3);
        assert!(serde_json::from_str::<MachineType>("\"floppy-disk\"").is_err());
    }

    #[test]
    fn there_are_exactly_six_slots() {
        assert_eq!(MachineType::ALL.len(), 6);
    }
}
