//! Free text to a closed label set.
//!
//! A nearest-centroid classifier over TF-IDF vectors: each label is the
//! normalised mean of its training examples, and a text is assigned to the
//! centroid with the highest cosine similarity. [`SpecialtyClassifier`] maps
//! complaints to medical specialties; the blood-request classifier reuses the
//! same [`CentroidClassifier`].

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data::Specialty;
use crate::error::{CareMatchError, InvalidInput, Result};
use crate::tfidf::{TfIdf, TfIdfBuilder, Tokenizer};
use crate::utils::{compute_cosine_similarity, l2_normalize};

pub const FALLBACK_SPECIALTY: Specialty = Specialty::Emergency;
pub const FALLBACK_CONFIDENCE: f64 = 0.1;

/// Built-in complaint corpus, one short phrase per line.
pub const TRAINING_CORPUS: &[(Specialty, &str)] = &[
    (Specialty::Cardiology, "chest pain pressure tightness heart"),
    (Specialty::Cardiology, "heart cardiac chest pain angina"),
    (Specialty::Cardiology, "heart attack myocardial infarction cardiac"),
    (Specialty::Cardiology, "irregular heartbeat palpitations arrhythmia"),
    (Specialty::Cardiology, "shortness of breath breathless on exertion cardiac"),
    (Specialty::Cardiology, "breathing difficulty dyspnea cardiac"),
    (Specialty::Cardiology, "high blood pressure hypertension heart"),
    (Specialty::Cardiology, "angina chest discomfort radiating to left arm"),
    (Specialty::Cardiology, "bypass stent angioplasty pacemaker valve"),
    (Specialty::Neurology, "severe headache migraine brain"),
    (Specialty::Neurology, "headache migraine brain neurological"),
    (Specialty::Neurology, "stroke paralysis facial droop slurred speech"),
    (Specialty::Neurology, "seizure epilepsy convulsion fits neurological"),
    (Specialty::Neurology, "memory loss dementia alzheimer confusion cognitive"),
    (Specialty::Neurology, "numbness tingling dizziness vertigo nerve"),
    (Specialty::Neurology, "brain surgery neurosurgery"),
    (Specialty::Neurology, "brain tumor removal neurosurgery"),
    (Specialty::Neurology, "aneurysm repair deep brain stimulation parkinson tremor"),
    (Specialty::Orthopedics, "broken bone fracture"),
    (Specialty::Orthopedics, "fracture broken bone orthopedic trauma"),
    (Specialty::Orthopedics, "broke leg arm fell"),
    (Specialty::Orthopedics, "fractured leg ankle wrist after fall accident"),
    (Specialty::Orthopedics, "back pain spine slipped disc orthopedic"),
    (Specialty::Orthopedics, "joint pain arthritis knee hip orthopedic"),
    (Specialty::Orthopedics, "sports injury ligament tear sprain"),
    (Specialty::Orthopedics, "joint replacement arthroscopy spinal surgery fracture repair"),
    (Specialty::Pediatrics, "child fever baby infant"),
    (Specialty::Pediatrics, "child fever pediatric baby infant"),
    (Specialty::Pediatrics, "child breathing problems wheezing toddler"),
    (Specialty::Pediatrics, "child breathing pediatric respiratory"),
    (Specialty::Pediatrics, "newborn neonatal jaundice feeding"),
    (Specialty::Pediatrics, "vaccination growth development kid adolescent"),
    (Specialty::Dermatology, "skin rash itching redness"),
    (Specialty::Dermatology, "acne pimples eczema psoriasis"),
    (Specialty::Dermatology, "suspicious mole changing colour skin lesion"),
    (Specialty::Dermatology, "hair loss nail fungal infection"),
    (Specialty::Oncology, "suspected cancer tumor malignancy oncology"),
    (Specialty::Oncology, "lump in breast cancer tumor"),
    (Specialty::Oncology, "unexplained weight loss night sweats cancer malignancy"),
    (Specialty::Oncology, "chemotherapy radiation therapy oncology carcinoma"),
    (Specialty::Emergency, "severe accident trauma bleeding"),
    (Specialty::Emergency, "accident trauma emergency critical"),
    (Specialty::Emergency, "unconscious collapsed unresponsive"),
    (Specialty::Emergency, "unconscious emergency critical trauma"),
    (Specialty::Emergency, "burn injury poisoning overdose"),
    (Specialty::Emergency, "emergency critical urgent ambulance resuscitation"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialtyPrediction {
    pub specialty: Specialty,
    /// In `[0, 1]`.
    pub confidence: f64,
    /// True when no known term was found and the default label was used.
    pub fallback: bool,
}

/// Nearest-centroid model over TF-IDF vectors for any closed label set.
#[derive(Debug)]
pub struct CentroidClassifier<L> {
    model: TfIdf,
    centroids: Vec<(L, Vec<f32>)>,
}

impl<L: Copy + PartialEq> CentroidClassifier<L> {
    /// `labels` fixes the centroid order, so ties always resolve the same way.
    /// Labels with no examples are left out.
    pub fn train(labels: &[L], examples: &[(L, &str)]) -> Result<Self> {
        if examples.is_empty() {
            return Err(CareMatchError::EmptyTrainingSet);
        }

        let mut builder = TfIdfBuilder::new(Tokenizer::new()?);
        for (_, text) in examples {
            builder.add(text);
        }
        let model = builder.build();

        let mut centroids = Vec::new();
        for &label in labels {
            let mut centroid = vec![0.0f32; model.vocabulary_len()];
            let mut n = 0usize;
            for (_, text) in examples.iter().filter(|(l, _)| *l == label) {
                for (slot, w) in centroid.iter_mut().zip(model.vectorize(text)) {
                    *slot += w;
                }
                n += 1;
            }
            if n == 0 {
                continue;
            }
            l2_normalize(&mut centroid);
            centroids.push((label, centroid));
        }

        debug!(
            vocabulary = model.vocabulary_len(),
            labels = centroids.len(),
            examples = examples.len(),
            "trained centroid classifier"
        );
        Ok(CentroidClassifier { model, centroids })
    }

    pub fn labels(&self) -> impl Iterator<Item = L> + '_ {
        self.centroids.iter().map(|(label, _)| *label)
    }

    /// Cosine similarity of `text` to every label centroid, in label order.
    pub fn label_scores(&self, text: &str) -> Vec<(L, f32)> {
        let vector = self.model.vectorize(text);
        self.centroids
            .iter()
            .map(|(label, centroid)| (*label, compute_cosine_similarity(&vector, centroid)))
            .collect()
    }

    /// Best label and its share of the positive similarity mass. `None` when
    /// the text shares no term with the training vocabulary.
    pub fn classify(&self, text: &str) -> Option<(L, f64)> {
        if self.model.known_tokens(text) == 0 {
            return None;
        }
        let scores = self.label_scores(text);
        let total: f32 = scores.iter().map(|(_, s)| s.max(0.0)).sum();
        let mut best: Option<(L, f32)> = None;
        for &(label, score) in &scores {
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((label, score)),
            }
        }
        match best {
            Some((label, score)) if total > 0.0 && score > 0.0 => {
                Some((label, f64::from(score / total).clamp(0.0, 1.0)))
            }
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct SpecialtyClassifier {
    inner: CentroidClassifier<Specialty>,
}

impl SpecialtyClassifier {
    pub fn train(examples: &[(Specialty, &str)]) -> Result<Self> {
        Ok(SpecialtyClassifier {
            inner: CentroidClassifier::train(&Specialty::ALL, examples)?,
        })
    }

    pub fn with_builtin_corpus() -> Result<Self> {
        Self::train(TRAINING_CORPUS)
    }

    pub fn labels(&self) -> impl Iterator<Item = Specialty> + '_ {
        self.inner.labels()
    }

    pub fn label_scores(&self, text: &str) -> Vec<(Specialty, f32)> {
        self.inner.label_scores(text)
    }

    pub fn predict_specialty(&self, text: &str) -> std::result::Result<SpecialtyPrediction, InvalidInput> {
        if text.trim().is_empty() {
            return Err(InvalidInput::EmptyDescription);
        }
        match self.inner.classify(text) {
            Some((specialty, confidence)) => {
                debug!(%specialty, confidence, "predicted specialty");
                Ok(SpecialtyPrediction {
                    specialty,
                    confidence,
                    fallback: false,
                })
            }
            None => {
                warn!("no recognised terms in description, using fallback specialty");
                Ok(fallback())
            }
        }
    }
}

fn fallback() -> SpecialtyPrediction {
    SpecialtyPrediction {
        specialty: FALLBACK_SPECIALTY,
        confidence: FALLBACK_CONFIDENCE,
        fallback: true,
    }
}
