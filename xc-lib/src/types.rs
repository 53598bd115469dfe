use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// One page of a recordings search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(rename = "numRecordings", default, deserialize_with = "flex_u64")]
    pub num_recordings: u64,
    #[serde(rename = "numSpecies", default, deserialize_with = "flex_u64")]
    pub num_species: u64,
    #[serde(default = "one", deserialize_with = "flex_u32")]
    pub page: u32,
    #[serde(rename = "numPages", default = "one", deserialize_with = "flex_u32")]
    pub num_pages: u32,
    #[serde(default)]
    pub recordings: Vec<Recording>,
}

fn one() -> u32 {
    1
}

/// A recording as returned by the API. Commonly used fields are typed, the
/// rest are kept verbatim in `extra`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    #[serde(deserialize_with = "flex_string")]
    pub id: String,
    #[serde(rename = "gen", default)]
    pub genus: String,
    #[serde(rename = "sp", default)]
    pub species: String,
    #[serde(rename = "ssp", default)]
    pub subspecies: String,
    #[serde(rename = "en", default)]
    pub english_name: String,
    #[serde(rename = "rec", default)]
    pub recordist: String,
    #[serde(rename = "cnt", default)]
    pub country: String,
    #[serde(rename = "loc", default)]
    pub locality: String,
    #[serde(rename = "type", default)]
    pub sound_type: String,
    /// Recording page URL.
    #[serde(default)]
    pub url: String,
    /// Audio file download URL.
    #[serde(default)]
    pub file: String,
    #[serde(rename = "file-name", default)]
    pub file_name: String,
    #[serde(rename = "lic", default)]
    pub license: String,
    #[serde(rename = "q", default)]
    pub quality: String,
    /// Duration as `m:ss`.
    #[serde(default)]
    pub length: String,
    #[serde(default)]
    pub date: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Recording {
    pub fn scientific_name(&self) -> String {
        format!("{} {}", self.genus, self.species).trim().to_string()
    }

    /// Audio URL with a scheme. The API sometimes returns protocol-relative URLs.
    pub fn audio_url(&self) -> Option<String> {
        let file = self.file.trim();
        if file.is_empty() {
            None
        } else if let Some(rest) = file.strip_prefix("//") {
            Some(format!("https://{rest}"))
        } else {
            Some(file.to_string())
        }
    }

    /// File extension of the original upload, with the leading dot.
    pub fn file_extension(&self) -> String {
        std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_else(|| ".mp3".to_string())
    }

    /// Parse `length` (`m:ss` or `h:mm:ss`) into seconds.
    pub fn length_secs(&self) -> Option<u32> {
        self.length
            .split(':')
            .try_fold(0u32, |acc, part| part.trim().parse::<u32>().ok().map(|v| acc * 60 + v))
            .filter(|_| !self.length.is_empty())
    }

    /// Flat string map suitable for object metadata.
    pub fn object_metadata(&self) -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert("xc-id".to_string(), self.id.clone());
        m.insert("scientific-name".to_string(), self.scientific_name());
        m.insert("common-name".to_string(), self.english_name.clone());
        m.insert("country".to_string(), self.country.clone());
        m.insert("quality".to_string(), self.quality.clone());
        m.insert("license".to_string(), self.license.clone());
        m.insert("recordist".to_string(), self.recordist.clone());
        m.retain(|_, v| !v.is_empty());
        m
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flex {
    Int(u64),
    Text(String),
}

fn flex_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    match Flex::deserialize(d)? {
        Flex::Int(n) => Ok(n),
        Flex::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn flex_u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let n = flex_u64(d)?;
    u32::try_from(n).map_err(serde::de::Error::custom)
}

fn flex_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Flex::deserialize(d)? {
        Flex::Int(n) => n.to_string(),
        Flex::Text(s) => s,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
        "numRecordings": "2",
        "numSpecies": "1",
        "page": 1,
        "numPages": "1",
        "recordings": [
            {
                "id": "12345",
                "gen": "Turdus",
                "sp": "migratorius",
                "ssp": "",
                "en": "American Robin",
                "rec": "Jane Doe",
                "cnt": "United States",
                "loc": "Central Park, New York",
                "lat": "40.78",
                "lon": "-73.97",
                "type": "song",
                "url": "//xeno-canto.org/12345",
                "file": "https://xeno-canto.org/12345/download",
                "file-name": "XC12345-robin.MP3",
                "lic": "//creativecommons.org/licenses/by-nc-sa/4.0/",
                "q": "A",
                "length": "1:05",
                "date": "2021-05-02",
                "also": ["Cardinalis cardinalis"]
            },
            { "id": 678, "file": "//xeno-canto.org/678/download" }
        ]
    }"#;

    #[test]
    fn parses_string_and_numeric_counts() {
        let page: SearchResponse = serde_json::from_str(PAGE).unwrap();
        assert_eq!(page.num_recordings, 2);
        assert_eq!(page.num_pages, 1);
        assert_eq!(page.recordings.len(), 2);
        assert_eq!(page.recordings[1].id, "678");
    }

    #[test]
    fn keeps_untyped_fields() {
        let page: SearchResponse = serde_json::from_str(PAGE).unwrap();
        let rec = &page.recordings[0];
        assert_eq!(rec.scientific_name(), "Turdus migratorius");
        assert_eq!(rec.extra["lat"], "40.78");
        assert!(rec.extra.contains_key("also"));
    }

    #[test]
    fn derived_fields() {
        let page: SearchResponse = serde_json::from_str(PAGE).unwrap();
        let rec = &page.recordings[0];
        assert_eq!(rec.file_extension(), ".mp3");
        assert_eq!(rec.length_secs(), Some(65));
        assert_eq!(page.recordings[1].file_extension(), ".mp3");
        assert_eq!(
            page.recordings[1].audio_url().as_deref(),
            Some("https://xeno-canto.org/678/download")
        );
        assert_eq!(page.recordings[1].length_secs(), None);
    }

    #[test]
    fn object_metadata_skips_blanks() {
        let page: SearchResponse = serde_json::from_str(PAGE).unwrap();
        let meta = page.recordings[1].object_metadata();
        assert_eq!(meta.len(), 1);
        assert_eq!(meta["xc-id"], "678");
    }

    #[test]
    fn missing_counts_default() {
        let page: SearchResponse = serde_json::from_str(r#"{"recordings": []}"#).unwrap();
        assert_eq!(page.num_pages, 1);
        assert_eq!(page.page, 1);
        assert!(page.recordings.is_empty());
    }
}
