//! alquran.cloud API response types
//!
//! See: https://alquran.cloud/api

use serde::Deserialize;

/// Envelope wrapping every API response.
///
/// `data` is an object on success and a plain message string on failure, so
/// it is kept untyped until `code` has been checked.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope {
    pub code: u16,
    #[serde(default)]
    pub status: String,
    pub data: serde_json::Value,
}

/// One chapter in a single edition (`/surah/{id}/{edition}`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurahEdition {
    pub number: u32,
    /// Name in Arabic script
    pub name: String,
    pub english_name: String,
    pub ayahs: Vec<Ayah>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ayah {
    /// Global verse number
    pub number: u32,
    pub number_in_surah: u32,
    pub text: String,
    /// Only present for audio editions
    #[serde(default)]
    pub audio: Option<String>,
}
