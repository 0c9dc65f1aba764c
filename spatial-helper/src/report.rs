//! Rapport d'écriture d'une table vers la base
//!
//! L'écriture ne remonte jamais d'erreur: le rapport porte le statut, l'action
//! effectuée sur la table de destination et la cause d'un éventuel échec.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

/// Statut global de l'écriture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WriteStatus {
    /// Table écrite et transaction commitée
    Success,
    /// Échec: transaction annulée, destination inchangée
    Failed,
}

/// Action effectuée sur la table de destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TableAction {
    /// Table absente, créée
    Created,
    /// Table existante supprimée puis recréée
    Recreated,
    /// Table existante réutilisée, lignes ajoutées
    Reused,
}

/// Rapport d'écriture
#[derive(Debug, Clone, Serialize)]
pub struct WriteReport {
    /// Table de destination (telle que demandée)
    pub table: String,
    /// Base de destination
    pub database: String,
    /// Statut global
    pub status: WriteStatus,
    /// Action sur la table (absente si l'échec précède la décision)
    pub action: Option<TableAction>,
    /// Nombre de lignes copiées
    pub rows_copied: u64,
    /// Durée de l'écriture
    pub duration_secs: f64,
    /// Cause de l'échec
    pub error: Option<String>,
}

impl WriteReport {
    pub fn new(database: &str, table: &str) -> Self {
        Self {
            table: table.to_string(),
            database: database.to_string(),
            status: WriteStatus::Success,
            action: None,
            rows_copied: 0,
            duration_secs: 0.0,
            error: None,
        }
    }

    /// Enregistre une écriture réussie
    pub fn succeed(&mut self, action: TableAction, rows_copied: u64) {
        self.status = WriteStatus::Success;
        self.action = Some(action);
        self.rows_copied = rows_copied;
        self.error = None;
    }

    /// Enregistre un échec (rien n'a été écrit)
    pub fn fail(&mut self, error: &anyhow::Error) {
        self.status = WriteStatus::Failed;
        self.rows_copied = 0;
        // Chaîne de contexte complète
        self.error = Some(format!("{:#}", error));
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    pub fn is_ok(&self) -> bool {
        self.status == WriteStatus::Success
    }

    /// Convertit en `Result` pour les appelants qui préfèrent propager
    pub fn into_result(self) -> Result<Self> {
        match &self.error {
            Some(error) => Err(anyhow::anyhow!("{}", error)),
            None => Ok(self),
        }
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("WRITE REPORT - {}/{}", self.database, self.table);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        if let Some(action) = self.action {
            println!("Table: {:?}", action);
        }
        println!("Rows copied: {}", self.rows_copied);
        println!("Duration: {:.2}s", self.duration_secs);

        if let Some(error) = &self.error {
            println!("\n--- ERROR ---");
            println!("  {}", error);
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
        match (&self.error, self.action) {
            (Some(error), _) => format!("{}: failed ({})", self.table, error),
            (None, Some(action)) => {
                format!("{}: {:?}, {} rows copied", self.table, action, self.rows_copied)
            }
            (None, None) => format!("{}: {} rows copied", self.table, self.rows_copied),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_succeed() {
        let mut report = WriteReport::new("gis", "roads");
        report.succeed(TableAction::Created, 12);

        assert!(report.is_ok());
        assert_eq!(report.action, Some(TableAction::Created));
        assert_eq!(report.rows_copied, 12);
        assert_eq!(report.summary(), "roads: Created, 12 rows copied");
    }

    #[test]
    fn test_fail_keeps_context_chain() {
        let mut report = WriteReport::new("gis", "roads");
        let error = anyhow::anyhow!("relation does not exist").context("Failed to drop table");
        report.fail(&error);

        assert_eq!(report.status, WriteStatus::Failed);
        assert_eq!(report.rows_copied, 0);
        let message = report.error.clone().unwrap();
        assert!(message.contains("Failed to drop table"));
        assert!(message.contains("relation does not exist"));
        assert!(report.into_result().is_err());
    }

    #[test]
    fn test_serialize() {
        let mut report = WriteReport::new("gis", "public.roads");
        report.succeed(TableAction::Reused, 3);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["status"], "Success");
        assert_eq!(json["action"], "Reused");
        assert_eq!(json["rows_copied"], 3);
        assert!(json["error"].is_null());
    }
}
