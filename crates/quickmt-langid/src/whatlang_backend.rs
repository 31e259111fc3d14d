//! Default in-process classifier backed by `whatlang`.
//!
//! `whatlang` emits ISO-639-3 codes and a single best guess, so this
//! backend maps codes down to ISO-639-1 and returns at most one prediction
//! per text regardless of `k`. The runtime's auto-detection path only ever
//! asks for the top label.

use crate::classifier::{ClassifierFactory, LanguageClassifier, Prediction};
use crate::errors::Result;

/// Classifier over a `whatlang` detector.
#[derive(Default)]
pub struct WhatlangClassifier;

/// Factory producing [`WhatlangClassifier`]s.
#[derive(Default)]
pub struct WhatlangFactory;

impl ClassifierFactory for WhatlangFactory {
    fn build(&self) -> Result<Box<dyn LanguageClassifier>> {
        Ok(Box::new(WhatlangClassifier))
    }
}

impl LanguageClassifier for WhatlangClassifier {
    fn classify(
        &self,
        texts: &[String],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<Vec<Prediction>>> {
        Ok(texts
            .iter()
            .map(|text| {
                if k == 0 {
                    return Vec::new();
                }
                whatlang::detect(text)
                    .and_then(|info| {
                        #[allow(clippy::cast_possible_truncation)]
                        let score = info.confidence() as f32;
                        let lang = iso639_1(info.lang().code())?;
                        (score >= threshold).then(|| {
                            vec![Prediction {
                                lang: lang.to_string(),
                                score,
                            }]
                        })
                    })
                    .unwrap_or_default()
            })
            .collect())
    }
}

/// Map an ISO-639-3 code to its ISO-639-1 equivalent, for the languages
/// `whatlang` can detect. Returns `None` for codes with no two-letter form.
fn iso639_1(code: &str) -> Option<&'static str> {
    let mapped = match code {
        "afr" => "af",
        "aka" => "ak",
        "amh" => "am",
        "ara" => "ar",
        "aze" => "az",
        "bel" => "be",
        "ben" => "bn",
        "bul" => "bg",
        "cat" => "ca",
        "ces" => "cs",
        "cmn" => "zh",
        "dan" => "da",
        "deu" => "de",
        "ell" => "el",
        "eng" => "en",
        "epo" => "eo",
        "est" => "et",
        "fin" => "fi",
        "fra" => "fr",
        "guj" => "gu",
        "heb" => "he",
        "hin" => "hi",
        "hrv" => "hr",
        "hun" => "hu",
        "hye" => "hy",
        "ind" => "id",
        "ita" => "it",
        "jav" => "jv",
        "jpn" => "ja",
        "kan" => "kn",
        "kat" => "ka",
        "khm" => "km",
        "kor" => "ko",
        "lat" => "la",
        "lav" => "lv",
        "lit" => "lt",
        "mal" => "ml",
        "mar" => "mr",
        "mkd" => "mk",
        "mya" => "my",
        "nep" => "ne",
        "nld" => "nl",
        "nob" => "nb",
        "ori" => "or",
        "pan" => "pa",
        "pes" => "fa",
        "pol" => "pl",
        "por" => "pt",
        "ron" => "ro",
        "rus" => "ru",
        "sin" => "si",
        "slk" => "sk",
        "slv" => "sl",
        "sna" => "sn",
        "spa" => "es",
        "srp" => "sr",
        "swe" => "sv",
        "tam" => "ta",
        "tel" => "te",
        "tgl" => "tl",
        "tha" => "th",
        "tuk" => "tk",
        "tur" => "tr",
        "ukr" => "uk",
        "urd" => "ur",
        "uzb" => "uz",
        "vie" => "vi",
        "yid" => "yi",
        "zul" => "zu",
        _ => return None,
    };
    Some(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_one(text: &str) -> Vec<Prediction> {
        WhatlangClassifier
            .classify(&[text.to_string()], 1, 0.0)
            .unwrap()
            .remove(0)
    }

    #[test]
    fn detects_english() {
        let preds = classify_one("The quick brown fox jumps over the lazy dog every morning.");
        assert_eq!(preds[0].lang, "en");
        assert!(preds[0].score > 0.0);
    }

    #[test]
    fn detects_french() {
        let preds =
            classify_one("Bonjour, je voudrais acheter une baguette et un croissant ce matin.");
        assert_eq!(preds[0].lang, "fr");
    }

    #[test]
    fn detects_spanish() {
        let preds = classify_one("Hola, me gustaría pedir una mesa para dos personas esta noche.");
        assert_eq!(preds[0].lang, "es");
    }

    #[test]
    fn k_zero_yields_nothing() {
        let preds = WhatlangClassifier
            .classify(&["Hello there".to_string()], 0, 0.0)
            .unwrap();
        assert!(preds[0].is_empty());
    }

    #[test]
    fn impossible_threshold_yields_nothing() {
        let preds = WhatlangClassifier
            .classify(&["Hello there friend".to_string()], 1, 2.0)
            .unwrap();
        assert!(preds[0].is_empty());
    }

    #[test]
    fn batch_preserves_order_and_length() {
        let texts = vec![
            "The weather is lovely today in the countryside.".to_string(),
            "Le temps est magnifique aujourd'hui à la campagne.".to_string(),
        ];
        let preds = WhatlangClassifier.classify(&texts, 1, 0.0).unwrap();
        assert_eq!(preds.len(), 2);
        assert_eq!(preds[0][0].lang, "en");
        assert_eq!(preds[1][0].lang, "fr");
    }

    #[test]
    fn code_mapping_covers_common_languages() {
        assert_eq!(iso639_1("eng"), Some("en"));
        assert_eq!(iso639_1("fra"), Some("fr"));
        assert_eq!(iso639_1("cmn"), Some("zh"));
        assert_eq!(iso639_1("pes"), Some("fa"));
        assert_eq!(iso639_1("xxx"), None);
    }

    #[test]
    fn factory_builds() {
        assert!(WhatlangFactory.build().is_ok());
    }
}
