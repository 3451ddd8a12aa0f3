//! Rapport de synchronisation
//!
//! Compteurs collectés par le synchroniseur au fil des événements de viewport,
//! plus les derniers échecs de chargement pour diagnostic.

use std::collections::VecDeque;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;

/// Nombre maximum d'échecs conservés dans le rapport
const MAX_RECORDED_FAILURES: usize = 20;

/// État global de la synchronisation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncStatus {
    /// Aucun échec
    Healthy,
    /// Des échecs, mais au moins un overlay installé
    Degraded,
    /// Uniquement des échecs
    Failing,
}

/// Échec de chargement avec contexte
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    /// Clé de la requête en échec
    pub key: String,
    /// Message d'erreur
    pub message: String,
}

/// Compteurs de synchronisation
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Événements de viewport stabilisé reçus
    pub settles: usize,
    /// Requêtes émises vers la source
    pub fetches_issued: usize,
    /// Viewports ignorés car même clé que la dernière requête
    pub duplicates_skipped: usize,
    /// Viewports sous le zoom minimum
    pub below_min_zoom: usize,
    /// Viewports hors de la région autorisée
    pub outside_region: usize,
    /// Overlays installés
    pub installs: usize,
    /// Réponses sans aucun chemin
    pub empty_results: usize,
    /// Échecs (réseau, timeout, réponse invalide, ressource)
    pub failures: usize,
    /// Réponses arrivées pour une clé périmée
    pub stale_discarded: usize,
    /// Settles abandonnés par l'appelant pendant le chargement
    pub abandoned: usize,
    /// Overlays retirés de la carte
    pub releases: usize,

    /// Derniers échecs (bornés)
    pub recent_failures: VecDeque<FailureRecord>,
}

impl SyncReport {
    /// Enregistre un échec de chargement
    pub fn record_failure(&mut self, key: &str, message: &str) {
        self.failures += 1;
        if self.recent_failures.len() == MAX_RECORDED_FAILURES {
            self.recent_failures.pop_front();
        }
        self.recent_failures.push_back(FailureRecord {
            key: key.to_string(),
            message: message.to_string(),
        });
    }

    /// Statut dérivé des compteurs
    pub fn status(&self) -> SyncStatus {
        match (self.failures, self.installs) {
            (0, _) => SyncStatus::Healthy,
            (_, 0) => SyncStatus::Failing,
            _ => SyncStatus::Degraded,
        }
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("SYNC REPORT");
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status());

        println!("\n--- SUMMARY ---");
        println!(
            "Settles: {} ({} below min zoom, {} outside region, {} duplicates)",
            self.settles, self.below_min_zoom, self.outside_region, self.duplicates_skipped
        );
        println!(
            "Fetches: {} issued, {} installed, {} empty, {} failed, {} stale, {} abandoned",
            self.fetches_issued,
            self.installs,
            self.empty_results,
            self.failures,
            self.stale_discarded,
            self.abandoned
        );
        println!("Overlays released: {}", self.releases);

        if !self.recent_failures.is_empty() {
            println!("\n--- FAILURES ({}) ---", self.failures);
            for f in &self.recent_failures {
                println!("  [{}] {}", f.key, f.message);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{} settles: {} fetched, {} installed, {} failed",
            self.settles, self.fetches_issued, self.installs, self.failures
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_default() {
        let report = SyncReport::default();
        assert_eq!(report.status(), SyncStatus::Healthy);
        assert_eq!(report.fetches_issued, 0);
    }

    #[test]
    fn test_status() {
        let mut report = SyncReport::default();
        report.record_failure("k", "timeout");
        assert_eq!(report.status(), SyncStatus::Failing);

        report.installs = 1;
        assert_eq!(report.status(), SyncStatus::Degraded);
    }

    #[test]
    fn test_failures_bounded() {
        let mut report = SyncReport::default();
        for i in 0..30 {
            report.record_failure(&format!("k{}", i), "boom");
        }

        assert_eq!(report.failures, 30);
        assert_eq!(report.recent_failures.len(), MAX_RECORDED_FAILURES);
        assert_eq!(report.recent_failures[0].key, "k10");
    }

    #[test]
    fn test_summary() {
        let report = SyncReport {
            settles: 12,
            fetches_issued: 4,
            installs: 3,
            ..Default::default()
        };

        let summary = report.summary();
        assert!(summary.contains("12 settles"));
        assert!(summary.contains("3 installed"));
    }
}
