use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! newtype_id {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

newtype_id!(TenantId);
newtype_id!(ResidentId);
newtype_id!(VisitorId);
newtype_id!(CredentialId);
newtype_id!(QrTokenId);
newtype_id!(AccessLogId);
newtype_id!(AuditLogId);
newtype_id!(ExtensionMapId);
