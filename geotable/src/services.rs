//! Services géométriques du processus
//!
//! Initialisation unique, à faire par l'application hôte avant toute opération
//! spatiale. Les réglages ne changent plus ensuite.

use std::sync::OnceLock;

use tracing::info;

use crate::GeoTableError;

static SERVICES: OnceLock<GeometryServices> = OnceLock::new();

/// Réglages partagés par toutes les valeurs spatiales
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryServices {
    /// Nombre de décimales conservées en sortie WKT (`None` = pas d'arrondi)
    pub precision: Option<u8>,

    /// SRID attribué aux géométries décodées qui n'en portent pas
    pub default_srid: i32,
}

impl Default for GeometryServices {
    fn default() -> Self {
        Self {
            precision: None,
            default_srid: 0,
        }
    }
}

/// Enregistre les services géométriques (une seule fois par processus)
pub fn init(services: GeometryServices) -> Result<&'static GeometryServices, GeoTableError> {
    let mut installed = false;
    let current = SERVICES.get_or_init(|| {
        installed = true;
        services
    });

    if !installed {
        return Err(GeoTableError::ServicesAlreadyInitialized);
    }

    info!(
        precision = ?current.precision,
        default_srid = current.default_srid,
        "Geometry services initialized"
    );
    Ok(current)
}

/// Accède aux services enregistrés
pub fn get() -> Result<&'static GeometryServices, GeoTableError> {
    SERVICES.get().ok_or(GeoTableError::ServicesNotInitialized)
}

/// Réglages par défaut pour les tests unitaires, quel que soit le test lancé en premier
#[cfg(test)]
pub(crate) fn init_for_tests() -> &'static GeometryServices {
    let _ = init(GeometryServices::default());
    get().unwrap()
}
