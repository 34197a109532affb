//! Data access contract listgen needs, decoupled from storage (SPEC_FULL.md §4.8).

/// Observation and pairing facts listgen needs per operator, beyond
/// `classification_state` (which callers pass in directly).
pub trait ListgenSource {
    /// `(imsi, msisdn)` pairs observed for `imei_norm` on `operator_id`
    /// within the last `lookback_days` days.
    fn observed_pairs(
        &self,
        operator_id: &str,
        imei_norm: &str,
        lookback_days: u32,
    ) -> Vec<(String, String)>;

    /// Whether `imei_norm` has a live pairing-list row with `imsi`.
    fn is_live_paired(&self, imei_norm: &str, imsi: &str) -> bool;

    /// All live `(imei_norm, imsi)` pairs on `operator_id`'s pairing list.
    fn live_pairing_list(&self, operator_id: &str) -> Vec<(String, String)>;

    /// All IMEIs on the live barred list for `operator_id`.
    fn barred_imeis(&self, operator_id: &str) -> Vec<String>;
}

#[cfg(test)]
pub mod test_support {
    use super::ListgenSource;
    use std::collections::{HashMap, HashSet};

    #[derive(Default)]
    pub struct FixtureSource {
        pub pairs: HashMap<String, Vec<(String, String)>>,
        pub live_pairs: HashSet<(String, String)>,
        pub pairing_list: HashMap<String, Vec<(String, String)>>,
        pub barred: HashMap<String, Vec<String>>,
    }

    impl FixtureSource {
        pub fn with_observed_pair(
            mut self,
            imei: &str,
            imsi: &str,
            msisdn: &str,
        ) -> Self {
            self.pairs
                .entry(imei.to_string())
                .or_default()
                .push((imsi.to_string(), msisdn.to_string()));
            self
        }

        pub fn with_live_pair(mut self, imei: &str, imsi: &str) -> Self {
            self.live_pairs.insert((imei.to_string(), imsi.to_string()));
            self
        }

        pub fn with_pairing_list_entry(mut self, operator_id: &str, imei: &str, imsi: &str) -> Self {
            self.pairing_list
                .entry(operator_id.to_string())
                .or_default()
                .push((imei.to_string(), imsi.to_string()));
            self
        }

        pub fn with_barred(mut self, operator_id: &str, imei: &str) -> Self {
            self.barred
                .entry(operator_id.to_string())
                .or_default()
                .push(imei.to_string());
            self
        }
    }

    impl ListgenSource for FixtureSource {
        fn observed_pairs(
            &self,
            _operator_id: &str,
            imei_norm: &str,
            _lookback_days: u32,
        ) -> Vec<(String, String)> {
            self.pairs.get(imei_norm).cloned().unwrap_or_default()
        }

        fn is_live_paired(&self, imei_norm: &str, imsi: &str) -> bool {
            self.live_pairs
                .contains(&(imei_norm.to_string(), imsi.to_string()))
        }

        fn live_pairing_list(&self, operator_id: &str) -> Vec<(String, String)> {
            self.pairing_list.get(operator_id).cloned().unwrap_or_default()
        }

        fn barred_imeis(&self, operator_id: &str) -> Vec<String> {
            self.barred.get(operator_id).cloned().unwrap_or_default()
        }
    }
}
