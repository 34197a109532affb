//! Data access contract dimensions need, decoupled from any particular
//! storage engine. `dirbs-infra-db` implements this against Postgres;
//! tests implement it against an in-memory fixture.

/// Shard-scoped facts a dimension needs to compute its matching set.
///
/// Every method takes `shard` so the classification engine can evaluate
/// one condition shard-by-shard and bound memory (SPEC_FULL.md §4.7).
pub trait ShardDataSource {
    /// All distinct `imei_norm` values observed on the network within
    /// this virtual shard, as of the run's clock.
    fn observed_imeis(&self, shard: u8) -> Vec<String>;

    /// Whether `imei_norm` has a live row on the stolen list.
    fn is_stolen(&self, imei_norm: &str) -> bool;

    /// Whether `imei_norm` has a live row on the device registration list.
    fn is_on_registration_list(&self, imei_norm: &str) -> bool;

    /// Whether `imei_norm`'s TAC has a live row in the GSMA TAC directory.
    fn gsma_tac_found(&self, imei_norm: &str) -> bool;

    /// Number of distinct IMSIs `imei_norm` was observed paired with
    /// within the configured lookback window.
    fn distinct_imsi_count(&self, imei_norm: &str) -> u32;

    /// Whether the radio-access-technology bitmask observed for
    /// `imei_norm` is consistent with the GSMA-reported device
    /// capability for its TAC.
    fn rat_is_consistent(&self, imei_norm: &str) -> bool;
}

/// In-memory `ShardDataSource` fixture shared by every dimension's unit tests.
#[cfg(test)]
pub mod test_support {
    use super::ShardDataSource;
    use std::collections::{HashMap, HashSet};

    #[derive(Default)]
    pub struct FixtureSource {
        pub stolen: HashSet<String>,
        pub registered: HashSet<String>,
        pub gsma_found: HashSet<String>,
        pub rat_inconsistent: HashSet<String>,
        pub imsi_counts: HashMap<String, u32>,
    }

    impl FixtureSource {
        pub fn with_stolen(mut self, imei: &str) -> Self {
            self.stolen.insert(imei.to_string());
            self
        }

        pub fn with_registered(mut self, imei: &str) -> Self {
            self.registered.insert(imei.to_string());
            self
        }

        pub fn with_gsma_found(mut self, imei: &str) -> Self {
            self.gsma_found.insert(imei.to_string());
            self
        }

        pub fn with_rat_inconsistent(mut self, imei: &str) -> Self {
            self.rat_inconsistent.insert(imei.to_string());
            self
        }

        pub fn with_imsi_count(mut self, imei: &str, count: u32) -> Self {
            self.imsi_counts.insert(imei.to_string(), count);
            self
        }
    }

    impl ShardDataSource for FixtureSource {
        fn observed_imeis(&self, _shard: u8) -> Vec<String> {
            Vec::new()
        }

        fn is_stolen(&self, imei_norm: &str) -> bool {
            self.stolen.contains(imei_norm)
        }

        fn is_on_registration_list(&self, imei_norm: &str) -> bool {
            self.registered.contains(imei_norm)
        }

        fn gsma_tac_found(&self, imei_norm: &str) -> bool {
            self.gsma_found.contains(imei_norm)
        }

        fn distinct_imsi_count(&self, imei_norm: &str) -> u32 {
            self.imsi_counts.get(imei_norm).copied().unwrap_or(0)
        }

        fn rat_is_consistent(&self, imei_norm: &str) -> bool {
            !self.rat_inconsistent.contains(imei_norm)
        }
    }
}
