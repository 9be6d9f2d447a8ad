//! Built-in reciters and per-verse audio addressing.
//!
//! Recitation archives name files positionally: the chapter id and the 1-based
//! verse ordinal, each zero-padded to three digits, then `.mp3`. Verse 5 of
//! chapter 2 under `Alafasy_128kbps` is `.../Alafasy_128kbps/002005.mp3`.

use crate::models::Reciter;

const CATALOG: &[(&str, &str, &str)] = &[
    ("mishary", "Mishary Alafasy", "Alafasy_128kbps"),
    ("sudais", "Abdurrahmaan As-Sudais", "Abdurrahmaan_As-Sudais_192kbps"),
    ("basit", "Abdul Basit", "Abdul_Basit_Murattal_192kbps"),
];

/// All built-in reciters. The first entry is the default.
pub fn catalog() -> Vec<Reciter> {
    CATALOG
        .iter()
        .map(|(id, name, path)| Reciter::new(*id, *name, *path))
        .collect()
}

pub fn default_reciter() -> Reciter {
    let (id, name, path) = CATALOG[0];
    Reciter::new(id, name, path)
}

pub fn find_reciter(id: &str) -> Option<Reciter> {
    CATALOG
        .iter()
        .find(|(candidate, _, _)| *candidate == id)
        .map(|(id, name, path)| Reciter::new(*id, *name, *path))
}

/// Remote file for the verse at zero-based `index` of `chapter_id`.
pub fn audio_locator(base_url: &str, reciter_path: &str, chapter_id: u32, index: usize) -> String {
    format!(
        "{}/{}/{:03}{:03}.mp3",
        base_url.trim_end_matches('/'),
        reciter_path,
        chapter_id,
        index + 1
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://everyayah.com/data";

    #[test]
    fn test_locator_padding() {
        assert_eq!(
            audio_locator(BASE, "Alafasy_128kbps", 1, 0),
            "https://everyayah.com/data/Alafasy_128kbps/001001.mp3"
        );
        assert_eq!(
            audio_locator(BASE, "Abdul_Basit_Murattal_192kbps", 2, 254),
            "https://everyayah.com/data/Abdul_Basit_Murattal_192kbps/002255.mp3"
        );
        assert_eq!(
            audio_locator("https://cdn/", "R", 114, 5),
            "https://cdn/R/114006.mp3"
        );
    }

    #[test]
    fn test_catalog() {
        let reciters = catalog();
        assert_eq!(reciters.len(), 3);
        assert_eq!(reciters[0], default_reciter());
        assert_eq!(default_reciter().url_path, "Alafasy_128kbps");
        assert!(reciters.iter().all(|r| r.validate().is_ok()));
    }

    #[test]
    fn test_find_reciter() {
        let sudais = find_reciter("sudais").unwrap();
        assert_eq!(sudais.url_path, "Abdurrahmaan_As-Sudais_192kbps");
        assert!(find_reciter("unknown").is_none());
    }
}
