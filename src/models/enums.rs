use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Role {
    Admin => "admin",
    Doctor => "doctor",
    Patient => "patient",
});

str_enum!(Gender {
    Male => "male",
    Female => "female",
    Other => "other",
});

str_enum!(AppointmentStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Completed => "completed",
    Cancelled => "cancelled",
});

str_enum!(Priority {
    Low => "low",
    Medium => "medium",
    High => "high",
    Urgent => "urgent",
});

str_enum!(RiskLevel {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

str_enum!(PaymentStatus {
    Pending => "pending",
    Paid => "paid",
    Partial => "partial",
    Cancelled => "cancelled",
});

str_enum!(PaymentMethod {
    Cash => "cash",
    Card => "card",
    Insurance => "insurance",
    Online => "online",
});

str_enum!(ConditionStatus {
    Active => "active",
    Resolved => "resolved",
    Chronic => "chronic",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_round_trips() {
        for role in [Role::Admin, Role::Doctor, Role::Patient] {
            assert_eq!(Role::from_str(role.as_str()).unwrap(), role);
        }
    }

    #[test]
    fn appointment_status_rejects_unknown() {
        let err = AppointmentStatus::from_str("archived");
        assert!(err.is_err());
    }

    #[test]
    fn priority_serializes_lowercase() {
        let json = serde_json::to_string(&Priority::Urgent).unwrap();
        assert_eq!(json, "\"urgent\"");
    }

    #[test]
    fn risk_level_deserializes_lowercase() {
        let risk: RiskLevel = serde_json::from_str("\"critical\"").unwrap();
        assert_eq!(risk, RiskLevel::Critical);
    }

    #[test]
    fn payment_status_covers_all_states() {
        for s in ["pending", "paid", "partial", "cancelled"] {
            assert!(PaymentStatus::from_str(s).is_ok());
        }
    }
}
