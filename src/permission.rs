//! Role permission model
//!
//! Permissions are a closed set of `module:action` values. Roles store a
//! subset of them; administrators implicitly hold all of them.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

macro_rules! permissions {
    ($($variant:ident => $key:literal, $label:literal;)+) => {
        /// Every permission a role can carry
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Permission {
            $($variant,)+
        }

        impl Permission {
            /// All permissions, in declaration order
            pub const ALL: &'static [Permission] = &[$(Permission::$variant,)+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Permission::$variant => $key,)+
                }
            }

            /// Human readable label
            pub fn label(self) -> &'static str {
                match self {
                    $(Permission::$variant => $label,)+
                }
            }
        }

        impl FromStr for Permission {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($key => Ok(Permission::$variant),)+
                    other => Err(AppError::validation(format!("unknown permission: {}", other))),
                }
            }
        }
    };
}

permissions! {
    UserCreate => "user:create", "Create users";
    UserRead => "user:read", "View users";
    UserUpdate => "user:update", "Edit users";
    UserDelete => "user:delete", "Delete users";
    RoleCreate => "role:create", "Create roles";
    RoleRead => "role:read", "View roles";
    RoleUpdate => "role:update", "Edit roles";
    RoleDelete => "role:delete", "Delete roles";
    DepartmentCreate => "department:create", "Create departments";
    DepartmentRead => "department:read", "View departments";
    DepartmentUpdate => "department:update", "Rename or move departments";
    DepartmentDelete => "department:delete", "Delete departments";
    ProductCreate => "product:create", "Create products";
    ProductRead => "product:read", "View products";
    ProductUpdate => "product:update", "Edit products";
    ProductDelete => "product:delete", "Delete products";
    ProductImport => "product:import", "Import products";
    ProductExport => "product:export", "Export products";
    InventoryCreate => "inventory:create", "Create inventory entries";
    InventoryRead => "inventory:read", "View inventory";
    InventoryUpdate => "inventory:update", "Edit inventory entries";
    InventoryDelete => "inventory:delete", "Delete inventory entries";
    ShipmentCreate => "shipment:create", "Create shipments";
    ShipmentRead => "shipment:read", "View shipments";
    ShipmentUpdate => "shipment:update", "Edit shipments";
    ShipmentDelete => "shipment:delete", "Delete shipments";
    BudgetCreate => "budget:create", "Create budgets";
    BudgetRead => "budget:read", "View budgets";
    BudgetUpdate => "budget:update", "Edit budgets";
    BudgetDelete => "budget:delete", "Delete budgets";
    CommissionCreate => "commission:create", "Create commission entries";
    CommissionRead => "commission:read", "View commission entries";
    CommissionUpdate => "commission:update", "Edit commission entries";
    CommissionDelete => "commission:delete", "Delete commission entries";
    TeamAccountCreate => "team_account:create", "Open team accounts";
    TeamAccountRead => "team_account:read", "View team accounts";
    TeamAccountUpdate => "team_account:update", "Edit team accounts";
    TeamAccountDelete => "team_account:delete", "Delete team accounts";
    TeamAccountRecharge => "team_account:recharge", "Recharge team accounts";
    FinanceCreate => "finance:create", "Submit income and expenses";
    FinanceRead => "finance:read", "View income and expenses";
    FinanceUpdate => "finance:update", "Edit income and expenses";
    FinanceDelete => "finance:delete", "Delete income and expenses";
    FinanceApprove => "finance:approve", "Approve or reject income and expenses";
    AccountRecordRead => "account_record:read", "View account ledgers";
    AccountRecordExport => "account_record:export", "Export account ledgers";
    SystemSettings => "system:settings", "Change system settings";
}

impl Permission {
    /// Module part of the key (`finance` for `finance:approve`)
    pub fn module(self) -> &'static str {
        self.as_str().split(':').next().unwrap_or_default()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse and de-duplicate a list of permission keys, rejecting unknown ones
pub fn parse_permission_list<S: AsRef<str>>(keys: &[S]) -> Result<Vec<Permission>, AppError> {
    let mut parsed = keys
        .iter()
        .map(|k| k.as_ref().trim())
        .filter(|k| !k.is_empty())
        .map(Permission::from_str)
        .collect::<Result<Vec<_>, _>>()?;
    parsed.sort();
    parsed.dedup();
    Ok(parsed)
}

/// Storage form: comma-separated keys
pub fn join_permissions(perms: &[Permission]) -> String {
    perms
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_every_key() {
        for perm in Permission::ALL {
            assert_eq!(perm.as_str().parse::<Permission>().unwrap(), *perm);
        }
        assert!(Permission::ALL.len() >= 45);
    }

    #[test]
    fn test_unknown_permission_rejected() {
        let err = "finance:launder".parse::<Permission>().unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_parse_list_dedups_and_sorts() {
        let perms =
            parse_permission_list(&["finance:approve", " user:create ", "finance:approve", ""])
                .unwrap();
        assert_eq!(perms, vec![Permission::UserCreate, Permission::FinanceApprove]);
        assert_eq!(join_permissions(&perms), "user:create,finance:approve");
    }

    #[test]
    fn test_module() {
        assert_eq!(Permission::TeamAccountRecharge.module(), "team_account");
        assert_eq!(Permission::FinanceApprove.module(), "finance");
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Permission::DepartmentCreate).unwrap();
        assert_eq!(json, "\"department:create\"");
        let back: Permission = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Permission::DepartmentCreate);
        assert!(serde_json::from_str::<Permission>("\"nope\"").is_err());
    }
}
