//! Sentence segmentation.
//!
//! Inputs are split on line breaks into paragraphs and each paragraph into
//! sentences; translation happens per sentence, and [`SentenceSegmenter::join`]
//! reassembles the outputs with single spaces inside a paragraph and a
//! newline at each paragraph change.

use regex::Regex;

/// Fragments shorter than this are glued onto the preceding sentence of the
/// same input and paragraph, which avoids mis-splits on abbreviations.
const MIN_FRAGMENT_CHARS: usize = 5;

/// Result of splitting a batch of texts into sentence units.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Segmented {
    /// Index of the originating input for each sentence.
    pub input_ids: Vec<usize>,
    /// Paragraph index (line number) within the input for each sentence.
    pub paragraph_ids: Vec<usize>,
    /// The sentence texts, stripped, in input order.
    pub sentences: Vec<String>,
}

impl Segmented {
    /// Number of sentence units.
    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    /// Whether no sentences were produced.
    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }
}

/// Splits text blobs into sentences and joins them back.
pub struct SentenceSegmenter {
    boundary: Regex,
}

impl Default for SentenceSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl SentenceSegmenter {
    /// Create a segmenter with the default boundary rule: one or more
    /// terminal punctuation marks, optional closing quotes/brackets, then
    /// whitespace.
    pub fn new() -> Self {
        let boundary = Regex::new(r#"[.!?…。！？]+["'»)\]]*\s+"#).expect("valid literal regex");
        Self { boundary }
    }

    /// Split each input into stripped, non-empty sentence units.
    pub fn split(&self, texts: &[String]) -> Segmented {
        let mut out = Segmented::default();
        for (input_id, text) in texts.iter().enumerate() {
            for (paragraph_id, line) in text.split('\n').enumerate() {
                for raw in self.split_paragraph(line) {
                    let sentence = raw.trim();
                    if sentence.is_empty() {
                        continue;
                    }
                    let follows_sentence = out
                        .input_ids
                        .last()
                        .zip(out.paragraph_ids.last())
                        .is_some_and(|(&i, &p)| i == input_id && p == paragraph_id);
                    if follows_sentence && sentence.chars().count() < MIN_FRAGMENT_CHARS {
                        if let Some(last) = out.sentences.last_mut() {
                            last.push(' ');
                            last.push_str(sentence);
                            continue;
                        }
                    }
                    out.input_ids.push(input_id);
                    out.paragraph_ids.push(paragraph_id);
                    out.sentences.push(sentence.to_string());
                }
            }
        }
        out
    }

    /// Inverse of [`split`](Self::split): produce `length` outputs from
    /// per-sentence texts, rejoining with spaces within a paragraph and a
    /// newline at paragraph changes.
    pub fn join(
        &self,
        input_ids: &[usize],
        paragraph_ids: &[usize],
        sentences: &[String],
        length: usize,
    ) -> Vec<String> {
        let mut out = vec![String::new(); length];
        let mut last_paragraph: Vec<Option<usize>> = vec![None; length];
        for ((&input_id, &paragraph_id), text) in
            input_ids.iter().zip(paragraph_ids).zip(sentences)
        {
            let slot = &mut out[input_id];
            match last_paragraph[input_id] {
                None => {}
                Some(p) if p == paragraph_id => slot.push(' '),
                Some(_) => slot.push('\n'),
            }
            slot.push_str(text);
            last_paragraph[input_id] = Some(paragraph_id);
        }
        out
    }

    fn split_paragraph<'a>(&self, paragraph: &'a str) -> Vec<&'a str> {
        let mut parts = Vec::new();
        let mut last = 0;
        for m in self.boundary.find_iter(paragraph) {
            parts.push(&paragraph[last..m.end()]);
            last = m.end();
        }
        if last < paragraph.len() {
            parts.push(&paragraph[last..]);
        }
        parts
    }
}
