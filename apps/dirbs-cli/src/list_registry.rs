//! Maps an `import <list_type>` argument to its CSV schema, primary-key
//! columns, and storage kind (SPEC_FULL.md §3 entity 4, §4.3-§4.6).

use dirbs_infra_db::HistoricListKind;
use dirbs_infra_validation::{
    CsvSchema, BARRED_LIST_SCHEMA, GSMA_SCHEMA, PAIRING_LIST_SCHEMA, REGISTRATION_LIST_SCHEMA,
    STOLEN_LIST_SCHEMA,
};

/// Where a list type's delta lands once staged and validated.
#[derive(Debug, Clone, Copy)]
pub enum Storage {
    /// One of the single-key historic reference lists.
    Historic(HistoricListKind),
    /// The per-operator pairing list; `--operator` is required.
    Pairing,
    /// The per-operator barred list; `--operator` is required.
    Barred,
}

pub struct ListTypeDef {
    pub list_type: &'static str,
    pub schema: &'static CsvSchema,
    pub pk_columns: &'static [&'static str],
    pub imei_column: Option<&'static str>,
    /// The column holding the subscriber IMSI, if any. Feeds the
    /// importer's out-of-prefix row invariant (SPEC_FULL.md §4.5.1),
    /// which only applies to lists that carry a subscriber identity.
    pub imsi_column: Option<&'static str>,
    pub storage: Storage,
    pub requires_operator: bool,
}

const REGISTRY: &[ListTypeDef] = &[
    ListTypeDef {
        list_type: "stolen_list",
        schema: &STOLEN_LIST_SCHEMA,
        pk_columns: &["imei_norm"],
        imei_column: Some("imei"),
        imsi_column: None,
        storage: Storage::Historic(HistoricListKind::Stolen),
        requires_operator: false,
    },
    ListTypeDef {
        list_type: "registration_list",
        schema: &REGISTRATION_LIST_SCHEMA,
        pk_columns: &["imei_norm"],
        imei_column: Some("imei"),
        imsi_column: None,
        storage: Storage::Historic(HistoricListKind::Registration),
        requires_operator: false,
    },
    ListTypeDef {
        list_type: "whitelist",
        schema: &REGISTRATION_LIST_SCHEMA,
        pk_columns: &["imei_norm"],
        imei_column: Some("imei"),
        imsi_column: None,
        storage: Storage::Historic(HistoricListKind::Whitelist),
        requires_operator: false,
    },
    ListTypeDef {
        list_type: "gsma_data",
        schema: &GSMA_SCHEMA,
        pk_columns: &["tac"],
        imei_column: None,
        imsi_column: None,
        storage: Storage::Historic(HistoricListKind::GsmaTac),
        requires_operator: false,
    },
    ListTypeDef {
        list_type: "pairing_list",
        schema: &PAIRING_LIST_SCHEMA,
        pk_columns: &["imei_norm", "imsi"],
        imei_column: Some("imei"),
        imsi_column: Some("imsi"),
        storage: Storage::Pairing,
        requires_operator: true,
    },
    ListTypeDef {
        list_type: "barred_list",
        schema: &BARRED_LIST_SCHEMA,
        pk_columns: &["imei_norm"],
        imei_column: Some("imei"),
        imsi_column: None,
        storage: Storage::Barred,
        requires_operator: true,
    },
];

#[must_use]
pub fn lookup(list_type: &str) -> Option<&'static ListTypeDef> {
    REGISTRY.iter().find(|def| def.list_type == list_type)
}

#[must_use]
pub fn known_list_types() -> Vec<&'static str> {
    REGISTRY.iter().map(|def| def.list_type).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_every_registered_list_type() {
        for name in known_list_types() {
            assert!(lookup(name).is_some());
        }
    }

    #[test]
    fn unknown_list_type_is_none() {
        assert!(lookup("not_a_real_list").is_none());
    }
}
