use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::models::mirror::mirror_status;

/// Envelope every provider endpoint answers with: a boolean success
/// flag, an optional human-readable message, and the entity payload.
#[derive(Debug, Deserialize)]
pub struct ProviderEnvelope {
    pub success: bool,
    pub msg: Option<String>,
    pub data: Option<serde_json::Value>,
}

/// One page of a listing endpoint. Items stay raw JSON; the importer
/// decodes them one by one.
#[derive(Debug, Clone, Deserialize)]
pub struct Pagina {
    #[serde(default)]
    pub itens: Vec<serde_json::Value>,
    #[serde(default = "default_page")]
    pub pagina: i64,
    #[serde(default = "default_page")]
    pub total_paginas: i64,
}

fn default_page() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderCliente {
    pub id: i64,
    pub nome: String,
    pub cpf_cnpj: String,
    pub email: Option<String>,
    pub telefone: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderContrato {
    pub id: i64,
    pub cliente_id: i64,
    pub plano_id: i64,
    pub valor: Option<Decimal>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderBoleto {
    pub id: i64,
    pub contrato_id: i64,
    pub valor: Decimal,
    pub vencimento: NaiveDate,
    pub pago_em: Option<DateTime<Utc>>,
    pub status: Option<String>,
}

/// Collapse the provider's status vocabulary onto the mirror's derived
/// field. Unknown values count as inactive rather than active.
pub fn normalize_status(raw: Option<&str>) -> &'static str {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("ativo") => mirror_status::ATIVO,
        Some("cancelado") => mirror_status::CANCELADO,
        _ => mirror_status::INATIVO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_known_statuses() {
        assert_eq!(normalize_status(Some("ativo")), "ativo");
        assert_eq!(normalize_status(Some("Ativo ")), "ativo");
        assert_eq!(normalize_status(Some("cancelado")), "cancelado");
        assert_eq!(normalize_status(Some("inativo")), "inativo");
    }

    #[test]
    fn normalize_unknown_is_inactive() {
        assert_eq!(normalize_status(Some("suspenso")), "inativo");
        assert_eq!(normalize_status(None), "inativo");
    }

    #[test]
    fn pagina_defaults() {
        let p: Pagina = serde_json::from_str("{}").unwrap();
        assert!(p.itens.is_empty());
        assert_eq!(p.pagina, 1);
        assert_eq!(p.total_paginas, 1);
    }
}
