//! Inventory process code enums mapping to SMALLINT lookup columns.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_codes` database table. The raw `i16` travels
//! through the persistence layer; these enums are the only place the
//! numbers are given meaning.

/// Code ID type matching SMALLINT/SMALLSERIAL in the database.
pub type CodeId = i16;

macro_rules! define_code_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database code ID.
            pub fn id(self) -> CodeId {
                self as CodeId
            }

            /// Look up a variant by its database code ID.
            pub fn from_id(id: CodeId) -> Option<Self> {
                match id {
                    $( $val => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for CodeId {
            fn from(value: $name) -> Self {
                value as CodeId
            }
        }
    };
}

define_code_enum! {
    /// Inventory process lifecycle state.
    ///
    /// `Requested` and `Running` are the only non-terminal states; every
    /// process ends in exactly one of the five terminal states and never
    /// leaves it.
    ProcessResultCode {
        Requested = 1,
        Running = 2,
        Completed = 3,
        PartialCompleted = 4,
        Cancelled = 5,
        Failed = 6,
        NotSupported = 7,
    }
}

define_code_enum! {
    /// Inventory process family. Each family owns one queue and one
    /// dispatch worker pool.
    ProcessType {
        Scan = 1,
        Migration = 2,
        Prerequisite = 3,
        Monitoring = 4,
    }
}

define_code_enum! {
    /// Inventory resource kind, used as the detail code when selecting a
    /// processor strategy within a family.
    InventoryKind {
        Server = 1,
        Middleware = 2,
        Application = 3,
        Database = 4,
    }
}

impl ProcessResultCode {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Requested | Self::Running)
    }

    /// The five terminal state IDs, in discriminant order.
    pub const TERMINAL_IDS: [CodeId; 5] = [
        Self::Completed as CodeId,
        Self::PartialCompleted as CodeId,
        Self::Cancelled as CodeId,
        Self::Failed as CodeId,
        Self::NotSupported as CodeId,
    ];
}

impl ProcessType {
    /// Short uppercase code used in execution keys and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scan => "SCAN",
            Self::Migration => "MIG",
            Self::Prerequisite => "PREQ",
            Self::Monitoring => "MON",
        }
    }

    /// Key identifying one running process in the interrupt registry.
    pub fn execution_key(self, process_id: crate::types::DbId) -> String {
        format!("{}:{}", self.as_str(), process_id)
    }
}

impl std::fmt::Display for ProcessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl InventoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Server => "SVR",
            Self::Middleware => "MW",
            Self::Application => "APP",
            Self::Database => "DBMS",
        }
    }
}

impl std::fmt::Display for InventoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
