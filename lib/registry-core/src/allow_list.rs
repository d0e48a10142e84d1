//! Allow-list view-model

use crate::{
    BatchReport, Confirm, ConfirmPrompt, Confirmation, RegistryBackend, RegistryError, Result,
};
use futures::future::join_all;
use registry_api::{AllowListEntry, AllowListQuery, CreatedEntry, NewAllowListEntry};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Check that `ip_addr` is a dotted quad: four groups of one to three digits,
/// each at most 255.
pub fn validate_ipv4(ip_addr: &str) -> Result<()> {
    let octets: Vec<&str> = ip_addr.split('.').collect();
    let well_formed = octets.len() == 4
        && octets.iter().all(|octet| {
            (1..=3).contains(&octet.len())
                && octet.bytes().all(|b| b.is_ascii_digit())
                && octet.parse::<u16>().map(|v| v <= 255).unwrap_or(false)
        });

    if well_formed {
        Ok(())
    } else {
        Err(RegistryError::Validation(format!(
            "'{}' is not a dotted-quad IPv4 address",
            ip_addr
        )))
    }
}

/// Local look at a CSV file before upload
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CsvScan {
    /// Non-empty rows
    pub rows: usize,
    /// 1-based line number and first-column value of rows that will not pass
    /// address validation
    pub invalid: Vec<(usize, String)>,
}

impl CsvScan {
    pub fn scan(csv: &[u8]) -> Self {
        let text = String::from_utf8_lossy(csv);
        let mut scan = CsvScan::default();

        for (index, line) in text.lines().enumerate() {
            let cell = line
                .split(',')
                .next()
                .unwrap_or_default()
                .trim()
                .trim_start_matches('\u{feff}')
                .trim_matches('"');
            if cell.is_empty() {
                continue;
            }
            scan.rows += 1;
            if validate_ipv4(cell).is_err() {
                scan.invalid.push((index + 1, cell.to_string()));
            }
        }

        scan
    }
}

/// AllowListStore owns the current allow-list snapshot and performs the
/// create/import/delete operations against the backend.
pub struct AllowListStore {
    backend: Arc<dyn RegistryBackend>,
    refresh_delay: Duration,
    entries: Arc<RwLock<Vec<AllowListEntry>>>,
}

impl AllowListStore {
    pub fn new(backend: Arc<dyn RegistryBackend>) -> Self {
        Self {
            backend,
            refresh_delay: Duration::from_millis(500),
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Pause between a batch of deletes and the refresh that follows
    pub fn with_refresh_delay(mut self, refresh_delay: Duration) -> Self {
        self.refresh_delay = refresh_delay;
        self
    }

    /// Current snapshot, as of the last refresh
    pub async fn entries(&self) -> Vec<AllowListEntry> {
        self.entries.read().await.clone()
    }

    /// Fetch the full list and replace the snapshot
    pub async fn list(&self) -> Result<Vec<AllowListEntry>> {
        let entries = self.backend.list_allow_list(&AllowListQuery::default()).await?;
        debug!("Allow-list has {} entries", entries.len());
        *self.entries.write().await = entries.clone();
        Ok(entries)
    }

    /// Fetch a filtered view. The snapshot is left alone.
    pub async fn list_filtered(&self, query: &AllowListQuery) -> Result<Vec<AllowListEntry>> {
        if query.is_empty() {
            return self.list().await;
        }
        self.backend.list_allow_list(query).await
    }

    /// Add one address. Invalid input, including surrounding whitespace,
    /// never reaches the backend.
    pub async fn add(&self, ip_addr: &str) -> Result<AllowListEntry> {
        validate_ipv4(ip_addr)?;

        let created = self
            .backend
            .create_allow_list(&[NewAllowListEntry::new(ip_addr)])
            .await?;

        let entry = created
            .into_iter()
            .next()
            .and_then(CreatedEntry::into_entry)
            .ok_or_else(|| {
                RegistryError::Conflict(format!("{} is already on the allow-list", ip_addr))
            })?;

        info!("Added {} to allow-list as #{}", entry.ip_addr, entry.id);
        self.refresh_after_mutation().await;
        Ok(entry)
    }

    /// Upload a CSV file; returns how many entries the backend created
    pub async fn import_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let csv = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "import.csv".to_string());
        self.import_bytes(&file_name, csv).await
    }

    /// Upload CSV content. Row-level acceptance is decided by the backend.
    pub async fn import_bytes(&self, file_name: &str, csv: Vec<u8>) -> Result<usize> {
        let scan = CsvScan::scan(&csv);
        for (line, value) in &scan.invalid {
            warn!("{} line {}: '{}' is not a valid address", file_name, line, value);
        }

        let created = self.backend.import_allow_list(file_name, csv).await?;
        let imported = created.into_iter().filter_map(CreatedEntry::into_entry).count();

        info!(
            "Imported {} of {} rows from {}",
            imported, scan.rows, file_name
        );
        self.refresh_after_mutation().await;
        Ok(imported)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.backend.delete_allow_list(id).await?;
        info!("Deleted allow-list entry #{}", id);
        self.refresh_after_mutation().await;
        Ok(())
    }

    /// Delete several entries after one confirmation covering all of them.
    ///
    /// Requests run concurrently and fail independently; the list is
    /// re-fetched once, after `refresh_delay`.
    pub async fn delete_many(&self, ids: &[i64], confirm: &dyn Confirm) -> Result<BatchReport<i64>> {
        let mut report = BatchReport::default();
        if ids.is_empty() {
            return Ok(report);
        }

        let prompt = ConfirmPrompt {
            title: "Confirm deletion".to_string(),
            message: format!("You are about to delete {} allow-list entries", ids.len()),
        };
        if confirm.confirm(&prompt).await == Confirmation::Declined {
            info!("Deletion of {} allow-list entries declined", ids.len());
            report.declined.extend_from_slice(ids);
            return Ok(report);
        }

        let results = join_all(ids.iter().map(|id| self.backend.delete_allow_list(*id))).await;
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(()) => report.succeeded.push(*id),
                Err(e) => {
                    warn!("Failed to delete allow-list entry #{}: {}", id, e);
                    report.failed.push((*id, e));
                }
            }
        }

        tokio::time::sleep(self.refresh_delay).await;
        self.refresh_after_mutation().await;
        Ok(report)
    }

    async fn refresh_after_mutation(&self) {
        if let Err(e) = self.list().await {
            warn!("Allow-list refresh after mutation failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AlwaysConfirm, MemoryBackend, NeverConfirm};

    fn store() -> (Arc<MemoryBackend>, AllowListStore) {
        let backend = Arc::new(MemoryBackend::new());
        let store = AllowListStore::new(backend.clone()).with_refresh_delay(Duration::ZERO);
        (backend, store)
    }

    #[test]
    fn test_validate_accepts_dotted_quads() {
        for ip in ["192.168.1.5", "0.0.0.0", "255.255.255.255", "10.0.0.1", "001.02.3.4"] {
            assert!(validate_ipv4(ip).is_ok(), "{} should be accepted", ip);
        }
    }

    #[test]
    fn test_validate_rejects_everything_else() {
        for ip in [
            "999.1.1.1",
            "256.0.0.1",
            "1.2.3",
            "1.2.3.4.5",
            "1..3.4",
            "a.b.c.d",
            "1234.1.1.1",
            "10.0.0.1/32",
            " 10.0.0.1",
            "",
            "+1.2.3.4",
        ] {
            assert!(
                matches!(validate_ipv4(ip), Err(RegistryError::Validation(_))),
                "{:?} should be rejected",
                ip
            );
        }
    }

    #[test]
    fn test_csv_scan() {
        let scan = CsvScan::scan(b"\xef\xbb\xbf10.0.0.1,a\n999.1.1.1\n\n\"10.0.0.3\"\n");
        assert_eq!(scan.rows, 3);
        assert_eq!(scan.invalid, vec![(2, "999.1.1.1".to_string())]);
    }

    #[tokio::test]
    async fn test_added_entry_appears_in_list() {
        let (_, store) = store();
        let entry = store.add("192.168.1.5").await.unwrap();

        let listed = store.list().await.unwrap();
        assert!(listed.iter().any(|e| e.id == entry.id && e.ip_addr == "192.168.1.5"));
        assert_eq!(store.entries().await, listed);
    }

    #[tokio::test]
    async fn test_invalid_add_is_rejected_before_any_request() {
        let (backend, store) = store();
        store.add("192.168.1.5").await.unwrap();
        let before = store.list().await.unwrap();
        let requests = backend.request_count();

        let err = store.add("999.1.1.1").await.unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));
        assert_eq!(backend.request_count(), requests);
        assert_eq!(store.list().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_padded_add_is_rejected_before_any_request() {
        let (backend, store) = store();
        let requests = backend.request_count();

        for ip in [" 10.0.0.1 ", "10.0.0.1\n", "\t10.0.0.1"] {
            let err = store.add(ip).await.unwrap_err();
            assert!(matches!(err, RegistryError::Validation(_)), "{:?}", ip);
        }
        assert_eq!(backend.request_count(), requests);
        assert!(store.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_add_is_conflict() {
        let (_, store) = store();
        store.add("10.1.1.1").await.unwrap();
        let err = store.add("10.1.1.1").await.unwrap_err();
        assert!(matches!(err, RegistryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_list_unavailable() {
        let (backend, store) = store();
        backend.set_offline(true);
        assert!(matches!(store.list().await, Err(RegistryError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_import_counts_created_entries() {
        let (_, store) = store();
        store.add("10.0.0.1").await.unwrap();

        let imported = store
            .import_bytes("ips.csv", b"10.0.0.1\n10.0.0.2\n10.0.0.3\n".to_vec())
            .await
            .unwrap();
        assert_eq!(imported, 2);
        assert_eq!(store.entries().await.len(), 3);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let (_, store) = store();
        assert!(matches!(store.delete(42).await, Err(RegistryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_filtered_list() {
        let (_, store) = store();
        store.add("10.0.0.1").await.unwrap();
        store.add("192.168.0.1").await.unwrap();

        let query = AllowListQuery {
            ip_addr: Some("192.".to_string()),
            id: None,
        };
        let filtered = store.list_filtered(&query).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(store.entries().await.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_many_declined_keeps_entries() {
        let (backend, store) = store();
        let a = store.add("10.0.0.1").await.unwrap();
        let requests = backend.request_count();

        let report = store.delete_many(&[a.id], &NeverConfirm).await.unwrap();
        assert_eq!(report.declined, vec![a.id]);
        assert_eq!(backend.request_count(), requests);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_many_failures_are_independent() {
        let (_, store) = store();
        let a = store.add("10.0.0.1").await.unwrap();
        let b = store.add("10.0.0.2").await.unwrap();

        let report = store
            .delete_many(&[a.id, 999, b.id], &AlwaysConfirm)
            .await
            .unwrap();
        assert_eq!(report.succeeded, vec![a.id, b.id]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 999);
        assert!(store.entries().await.is_empty());
    }
}
