//! Built-in guideline corpus and a lexical retriever over it.
//!
//! Deployments with a vector database plug their own [`GuidelineRetriever`] into the
//! orchestrator. This module keeps the CLI and REST server usable without one: the corpus
//! is scored by term overlap with the query, which is crude but deterministic.

use crate::collaborators::GuidelineRetriever;
use crate::error::CollaboratorError;
use crate::state::GuidelineHit;
use std::collections::HashSet;

/// A single guideline snippet with its provenance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Guideline {
    pub text: String,
    pub source: String,
}

impl Guideline {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
        }
    }
}

const BUILTIN_GUIDELINES: &[(&str, &str)] = &[
    (
        "Acute chest pain requires urgent ECG, serial cardiac troponins, chest X-ray, basic metabolic panel and CBC to rule out acute coronary syndrome and other causes.",
        "Cardiology guideline",
    ),
    (
        "Shortness of breath with suspected heart failure should prompt chest X-ray, NT-proBNP, ECG, echocardiography and assessment of renal function and electrolytes.",
        "Heart failure guideline",
    ),
    (
        "Patients with fever of unknown origin generally need CBC with differential, ESR, CRP, urine analysis, chest X-ray and targeted cultures based on suspected source.",
        "Infectious disease guideline",
    ),
    (
        "For acute cough with systemic symptoms, consider CBC, chest X-ray and inflammatory markers such as CRP to differentiate bacterial from viral infection.",
        "Respiratory infection guideline",
    ),
    (
        "Chronic cough may require chest X-ray, pulmonary function tests including spirometry, and sputum AFB smear in tuberculosis-endemic regions.",
        "Chronic cough guideline",
    ),
    (
        "Chronic diabetes follow-up should include HbA1c every 3 to 6 months, fasting plasma glucose, lipid profile, renal function test and urine microalbuminuria.",
        "Diabetes follow-up guideline",
    ),
    (
        "Hypertensive patients require regular monitoring of renal function, electrolytes, fasting lipid profile, ECG and periodic echocardiography if end-organ damage suspected.",
        "Hypertension guideline",
    ),
    (
        "Uncomplicated urinary tract infection is typically diagnosed with urine routine and microscopy; urine culture is recommended in recurrent or complicated cases.",
        "UTI guideline",
    ),
    (
        "Patients with syncope should undergo ECG, blood glucose, orthostatic blood pressure measurement and further cardiac evaluation including echocardiogram where indicated.",
        "Syncope guideline",
    ),
    (
        "Evaluation of anemia includes complete blood count with peripheral smear, iron studies, vitamin B12 and folate levels and stool occult blood when gastrointestinal blood loss is suspected.",
        "Anemia guideline",
    ),
    (
        "Stroke-like symptoms such as sudden focal weakness or slurred speech require immediate CT brain without contrast, blood glucose check, electrolytes and ECG as part of acute stroke protocol.",
        "Stroke guideline",
    ),
    (
        "Persistent headache with red flag features such as vomiting or neurological deficit warrants neuroimaging with CT or MRI brain and basic laboratory work-up.",
        "Headache guideline",
    ),
    (
        "Acute abdominal pain is evaluated using CBC, serum amylase and lipase, liver function tests, serum electrolytes and ultrasound abdomen, with CT imaging if serious pathology suspected.",
        "Acute abdomen guideline",
    ),
    (
        "Pregnant women require routine antenatal work-up including CBC, blood group and Rh typing, urine analysis and obstetric ultrasound to assess fetal wellbeing.",
        "Antenatal care guideline",
    ),
];

// Words too common in queries and guidelines to carry any signal.
const STOP_WORDS: &[&str] = &[
    "a", "and", "as", "at", "be", "by", "for", "from", "if", "in", "include", "includes",
    "is", "of", "on", "or", "should", "such", "the", "to", "using", "with", "patient",
    "patients", "suggest", "initial", "basic", "tests", "note", "require", "requires",
];

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|t| t.len() > 1 && !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Term-overlap retriever over an in-memory guideline corpus.
#[derive(Clone, Debug)]
pub struct LexicalRetriever {
    entries: Vec<(Guideline, HashSet<String>)>,
}

impl LexicalRetriever {
    pub fn new(guidelines: Vec<Guideline>) -> Self {
        let entries = guidelines
            .into_iter()
            .map(|g| {
                let t = terms(&g.text);
                (g, t)
            })
            .collect();
        Self { entries }
    }

    /// Retriever over the fourteen built-in clinical guideline snippets.
    pub fn builtin() -> Self {
        Self::new(
            BUILTIN_GUIDELINES
                .iter()
                .map(|(text, source)| Guideline::new(*text, *source))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl GuidelineRetriever for LexicalRetriever {
    fn retrieve(&self, query: &str, k: usize) -> Result<Vec<GuidelineHit>, CollaboratorError> {
        let query_terms = terms(query);
        if query_terms.is_empty() || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(idx, (_, doc_terms))| {
                let shared = query_terms.intersection(doc_terms).count();
                if shared == 0 {
                    return None;
                }
                // Normalised by query size so long guidelines are not favoured.
                Some((idx, shared as f32 / query_terms.len() as f32))
            })
            .collect();

        // Highest score first; corpus order breaks ties so results are stable.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(idx, score)| {
                let guideline = &self.entries[idx].0;
                GuidelineHit {
                    text: guideline.text.clone(),
                    source: guideline.source.clone(),
                    score,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_corpus_is_loaded() {
        assert_eq!(LexicalRetriever::builtin().len(), 14);
    }

    #[test]
    fn chest_pain_query_ranks_cardiology_first() {
        let retriever = LexicalRetriever::builtin();
        let hits = retriever
            .retrieve("Suggest initial basic tests for patient with: chest pain", 3)
            .unwrap();

        assert!(!hits.is_empty(), "chest pain should match something");
        assert!(hits.len() <= 3);
        assert_eq!(hits[0].source, "Cardiology guideline");
        assert!(
            hits.windows(2).all(|w| w[0].score >= w[1].score),
            "hits should be ranked by score"
        );
    }

    #[test]
    fn query_without_content_terms_returns_nothing() {
        let retriever = LexicalRetriever::builtin();
        assert!(retriever.retrieve("the and of", 3).unwrap().is_empty());
    }

    #[test]
    fn custom_corpus_is_searchable() {
        let retriever = LexicalRetriever::new(vec![
            Guideline::new("Gout flares respond to colchicine", "Rheumatology"),
            Guideline::new("Migraine prophylaxis with propranolol", "Neurology"),
        ]);
        let hits = retriever.retrieve("colchicine dosing in gout", 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, "Rheumatology");
    }
}
