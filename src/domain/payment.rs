use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
        }
    }

    /// Position on the only forward path: pending -> processing -> success | failed.
    pub fn rank(&self) -> u8 {
        match self {
            PaymentStatus::Pending => 0,
            PaymentStatus::Processing => 1,
            PaymentStatus::Success | PaymentStatus::Failed => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Success | PaymentStatus::Failed)
    }

    /// Statuses a row may currently hold for `self` to be written over it.
    pub fn predecessors(&self) -> &'static [PaymentStatus] {
        match self {
            PaymentStatus::Pending => &[],
            PaymentStatus::Processing => &[PaymentStatus::Pending],
            PaymentStatus::Success | PaymentStatus::Failed => {
                &[PaymentStatus::Pending, PaymentStatus::Processing]
            }
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "processing" => Ok(PaymentStatus::Processing),
            "success" => Ok(PaymentStatus::Success),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(format!("Invalid payment status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Mtn,
    Airtel,
    Card,
    Manual,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Mtn => "mtn",
            PaymentMethod::Airtel => "airtel",
            PaymentMethod::Card => "card",
            PaymentMethod::Manual => "manual",
        }
    }

    pub fn mobile_network(&self) -> Option<MobileNetwork> {
        match self {
            PaymentMethod::Mtn => Some(MobileNetwork::Mtn),
            PaymentMethod::Airtel => Some(MobileNetwork::Airtel),
            PaymentMethod::Card | PaymentMethod::Manual => None,
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mtn" => Ok(PaymentMethod::Mtn),
            "airtel" => Ok(PaymentMethod::Airtel),
            "card" => Ok(PaymentMethod::Card),
            "manual" => Ok(PaymentMethod::Manual),
            other => Err(format!("Invalid payment method: {}", other)),
        }
    }
}

/// The mobile-money networks that push a prompt to the donor's handset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MobileNetwork {
    Mtn,
    Airtel,
}

impl MobileNetwork {
    pub fn as_str(&self) -> &'static str {
        match self {
            MobileNetwork::Mtn => "mtn",
            MobileNetwork::Airtel => "airtel",
        }
    }
}

impl fmt::Display for MobileNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advances(current: PaymentStatus, next: PaymentStatus) -> bool {
        next.rank() > current.rank()
    }

    #[test]
    fn test_forward_path_only() {
        use PaymentStatus::*;

        assert!(advances(Pending, Processing));
        assert!(advances(Processing, Success));
        assert!(advances(Processing, Failed));
        assert!(advances(Pending, Failed));

        assert!(!advances(Processing, Pending));
        assert!(!advances(Processing, Processing));
        for terminal in [Success, Failed] {
            for next in [Pending, Processing, Success, Failed] {
                assert!(!advances(terminal, next));
            }
        }
    }

    #[test]
    fn test_predecessors_agree_with_transitions() {
        use PaymentStatus::*;
        let all = [Pending, Processing, Success, Failed];

        for next in all {
            for current in all {
                assert_eq!(
                    next.predecessors().contains(&current),
                    advances(current, next),
                    "{} -> {}",
                    current,
                    next
                );
            }
        }
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&PaymentMethod::Airtel).unwrap(), "\"airtel\"");
        assert_eq!("manual".parse::<PaymentMethod>().unwrap(), PaymentMethod::Manual);
        assert_eq!(PaymentMethod::Mtn.mobile_network(), Some(MobileNetwork::Mtn));
        assert_eq!(PaymentMethod::Card.mobile_network(), None);
        assert!("bitcoin".parse::<PaymentMethod>().is_err());
    }
}
