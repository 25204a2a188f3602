//! Capability registry and detector.
//!
//! One immutable [`Variant`] table per driver contract family lists the base
//! method set and the ordered optional capabilities. Bit `i` of a
//! [`CapabilitySet`] always refers to `optional[i]` of the matching table, so
//! the detector and the proxies' accessors stay table-driven: adding a
//! capability means adding a row here, not touching the detection logic.

use std::fmt;

use crate::driver::{Conn, Connector, Driver, Rows, Stmt, Tx};

/// Bitmask of optional capabilities present on an instance.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapabilitySet(u16);

impl CapabilitySet {
    pub const EMPTY: Self = Self(0);

    /// Largest number of optional capabilities a variant may declare.
    pub const CAPACITY: usize = u16::BITS as usize;

    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Every capability of a variant declaring `count` of them.
    #[must_use]
    pub const fn all(count: usize) -> Self {
        if count >= Self::CAPACITY {
            Self(u16::MAX)
        } else {
            Self((1 << count) - 1)
        }
    }

    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, index: usize) -> bool {
        index < Self::CAPACITY && self.0 & (1 << index) != 0
    }

    #[must_use]
    pub const fn with(self, index: usize) -> Self {
        Self(self.0 | (1 << index))
    }

    pub const fn insert(&mut self, index: usize) {
        self.0 |= 1 << index;
    }

    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn is_subset(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    /// Indices of the set bits, ascending.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..Self::CAPACITY).filter(move |&i| self.contains(i))
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapabilitySet({:#b})", self.0)
    }
}

impl FromIterator<usize> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

/// An optional capability: a named method set plus its runtime test.
pub struct Capability<T: ?Sized + 'static> {
    pub name: &'static str,
    pub methods: &'static [&'static str],
    /// Whether an instance exposes this capability.
    pub probe: fn(&T) -> bool,
}

impl<T: ?Sized + 'static> fmt::Debug for Capability<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}

/// A contract family: base method set and ordered optional capabilities.
pub struct Variant<T: ?Sized + 'static> {
    pub name: &'static str,
    pub base: &'static [&'static str],
    pub optional: &'static [Capability<T>],
}

impl<T: ?Sized + 'static> fmt::Debug for Variant<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variant")
            .field("name", &self.name)
            .field("base", &self.base)
            .field("optional", &self.optional)
            .finish()
    }
}

impl<T: ?Sized + 'static> Variant<T> {
    /// Number of optional capabilities.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.optional.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.optional.is_empty()
    }

    /// The set with every optional capability of this variant.
    #[must_use]
    pub const fn full(&self) -> CapabilitySet {
        CapabilitySet::all(self.optional.len())
    }

    /// Registry index of the capability called `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<usize> {
        self.optional.iter().position(|c| c.name == name)
    }

    /// Capability names present in `set`, in registry order.
    #[must_use]
    pub fn describe(&self, set: CapabilitySet) -> Vec<&'static str> {
        set.iter()
            .filter_map(|i| self.optional.get(i))
            .map(|c| c.name)
            .collect()
    }

    /// Every interceptable method: base first, then each capability's.
    pub fn methods(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.base
            .iter()
            .chain(self.optional.iter().flat_map(|c| c.methods.iter()))
            .copied()
    }
}

/// Runs each capability probe of `variant` against `instance` once.
pub fn detect<T: ?Sized + 'static>(instance: &T, variant: &Variant<T>) -> CapabilitySet {
    debug_assert!(variant.optional.len() <= CapabilitySet::CAPACITY);

    let set: CapabilitySet = variant
        .optional
        .iter()
        .enumerate()
        .filter(|(_, capability)| (capability.probe)(instance))
        .map(|(index, _)| index)
        .collect();

    tracing::trace!(
        variant = variant.name,
        capabilities = ?variant.describe(set),
        "detected capabilities"
    );
    set
}

// ═══════════════════════════════════════════════════════════════════════════
// Registry tables
// ═══════════════════════════════════════════════════════════════════════════

/// Indices into [`DRIVER`].
pub mod driver {
    pub const OPEN_CONNECTOR: usize = 0;
}

/// Indices into [`CONNECTOR`].
pub mod connector {
    pub const CLOSER: usize = 0;
}

/// Indices into [`CONN`].
pub mod conn {
    pub const PINGER: usize = 0;
    pub const EXECER: usize = 1;
    pub const EXECER_CONTEXT: usize = 2;
    pub const QUERYER: usize = 3;
    pub const QUERYER_CONTEXT: usize = 4;
    pub const PREPARE_CONTEXT: usize = 5;
    pub const BEGIN_TX: usize = 6;
    pub const SESSION_RESETTER: usize = 7;
    pub const VALIDATOR: usize = 8;
    pub const NAMED_VALUE_CHECKER: usize = 9;
}

/// Indices into [`STMT`].
pub mod stmt {
    pub const COLUMN_CONVERTER: usize = 0;
    pub const NAMED_VALUE_CHECKER: usize = 1;
    pub const EXEC_CONTEXT: usize = 2;
    pub const QUERY_CONTEXT: usize = 3;
}

/// Indices into [`ROWS`].
pub mod rows {
    pub const DATABASE_TYPE_NAME: usize = 0;
    pub const LENGTH: usize = 1;
    pub const NULLABLE: usize = 2;
    pub const PRECISION_SCALE: usize = 3;
    pub const SCAN_TYPE: usize = 4;
    pub const NEXT_RESULT_SET: usize = 5;
}

pub static DRIVER: Variant<dyn Driver> = Variant {
    name: "driver",
    base: &["open"],
    optional: &[Capability {
        name: "OpenConnector",
        methods: &["open_connector"],
        probe: |d| d.as_open_connector().is_some(),
    }],
};

pub static CONNECTOR: Variant<dyn Connector> = Variant {
    name: "connector",
    base: &["connect", "driver"],
    optional: &[Capability {
        name: "ConnectorClose",
        methods: &["close"],
        probe: |c| c.as_closer().is_some(),
    }],
};

pub static CONN: Variant<dyn Conn> = Variant {
    name: "connection",
    base: &["prepare", "close", "begin"],
    optional: &[
        Capability {
            name: "Pinger",
            methods: &["ping"],
            probe: |c| c.as_pinger().is_some(),
        },
        Capability {
            name: "Execer",
            methods: &["exec"],
            probe: |c| c.as_execer().is_some(),
        },
        Capability {
            name: "ExecerContext",
            methods: &["exec_context"],
            probe: |c| c.as_execer_context().is_some(),
        },
        Capability {
            name: "Queryer",
            methods: &["query"],
            probe: |c| c.as_queryer().is_some(),
        },
        Capability {
            name: "QueryerContext",
            methods: &["query_context"],
            probe: |c| c.as_queryer_context().is_some(),
        },
        Capability {
            name: "ConnPrepareContext",
            methods: &["prepare_context"],
            probe: |c| c.as_prepare_context().is_some(),
        },
        Capability {
            name: "ConnBeginTx",
            methods: &["begin_tx"],
            probe: |c| c.as_begin_tx().is_some(),
        },
        Capability {
            name: "SessionResetter",
            methods: &["reset_session"],
            probe: |c| c.as_session_resetter().is_some(),
        },
        Capability {
            name: "Validator",
            methods: &["is_valid"],
            probe: |c| c.as_validator().is_some(),
        },
        Capability {
            name: "NamedValueChecker",
            methods: &["check_named_value"],
            probe: |c| c.as_named_value_checker().is_some(),
        },
    ],
};

pub static STMT: Variant<dyn Stmt> = Variant {
    name: "statement",
    base: &["close", "num_input", "exec", "query"],
    optional: &[
        Capability {
            name: "ColumnConverter",
            methods: &["column_converter"],
            probe: |s| s.as_column_converter().is_some(),
        },
        Capability {
            name: "NamedValueChecker",
            methods: &["check_named_value"],
            probe: |s| s.as_named_value_checker().is_some(),
        },
        Capability {
            name: "StmtExecContext",
            methods: &["exec_context"],
            probe: |s| s.as_exec_context().is_some(),
        },
        Capability {
            name: "StmtQueryContext",
            methods: &["query_context"],
            probe: |s| s.as_query_context().is_some(),
        },
    ],
};

pub static ROWS: Variant<dyn Rows> = Variant {
    name: "rows",
    base: &["columns", "close", "next"],
    optional: &[
        Capability {
            name: "ColumnTypeDatabaseTypeName",
            methods: &["column_type_database_type_name"],
            probe: |r| r.as_column_type_database_type_name().is_some(),
        },
        Capability {
            name: "ColumnTypeLength",
            methods: &["column_type_length"],
            probe: |r| r.as_column_type_length().is_some(),
        },
        Capability {
            name: "ColumnTypeNullable",
            methods: &["column_type_nullable"],
            probe: |r| r.as_column_type_nullable().is_some(),
        },
        Capability {
            name: "ColumnTypePrecisionScale",
            methods: &["column_type_precision_scale"],
            probe: |r| r.as_column_type_precision_scale().is_some(),
        },
        Capability {
            name: "ColumnTypeScanType",
            methods: &["column_type_scan_type"],
            probe: |r| r.as_column_type_scan_type().is_some(),
        },
        Capability {
            name: "RowsNextResultSet",
            methods: &["has_next_result_set", "next_result_set"],
            probe: |r| r.as_next_result_set().is_some(),
        },
    ],
};

pub static TX: Variant<dyn Tx> = Variant {
    name: "transaction",
    base: &["commit", "rollback"],
    optional: &[],
};
