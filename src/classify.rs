// Sector Classifier - bag-of-words text classification for DTI-NCCP labels
//
// The pipeline mirrors the standard text-classification recipe: token
// counts, smoothed TF-IDF with L2 row normalization, then a one-vs-rest
// linear classifier trained by stochastic gradient descent on the hinge
// loss with L2 regularization. Training is deterministic: the per-epoch
// shuffle runs off a fixed seed.
//
// All knobs travel in an explicitly passed `ClassifierConfig`; there is no
// module-level classifier state. The module is a replaceable capability:
// callers depend only on the train/predict contract of `SectorClassifier`.

use std::collections::BTreeMap;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::db;
use crate::filter::FilterSpec;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Training hyperparameters, passed explicitly to every run.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierConfig {
    /// L2 regularization strength.
    pub alpha: f64,
    /// Number of passes over the training corpus.
    pub epochs: usize,
    /// Seed for the per-epoch shuffle; fixed for reproducible assignments.
    pub seed: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            alpha: 1e-3,
            epochs: 5,
            seed: 42,
        }
    }
}

const LEARNING_RATE: f64 = 0.1;

// ============================================================================
// TOKENIZATION
// ============================================================================

/// Lowercase alphanumeric runs of length >= 2; everything else separates.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

// ============================================================================
// CLASSIFIER
// ============================================================================

/// A fitted vectorizer + linear model pair.
#[derive(Debug, Clone)]
pub struct SectorClassifier {
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

impl SectorClassifier {
    /// Fit vocabulary, idf, and per-class hyperplanes over labeled
    /// documents. Returns None when there is nothing to learn from:
    /// no classes, no documents, or a corpus with no usable tokens.
    pub fn train(
        documents: &[String],
        targets: &[usize],
        n_classes: usize,
        config: &ClassifierConfig,
    ) -> Option<Self> {
        if documents.is_empty() || documents.len() != targets.len() || n_classes == 0 {
            return None;
        }

        let tokenized: Vec<Vec<String>> = documents.iter().map(|doc| tokenize(doc)).collect();

        let mut vocabulary = BTreeMap::new();
        for tokens in &tokenized {
            for token in tokens {
                let next_index = vocabulary.len();
                vocabulary.entry(token.clone()).or_insert(next_index);
            }
        }
        if vocabulary.is_empty() {
            return None;
        }
        // Re-index in sorted term order so the vocabulary is independent of
        // document order
        for (index, (_, slot)) in vocabulary.iter_mut().enumerate() {
            *slot = index;
        }

        let n_docs = documents.len();
        let mut document_frequency = vec![0usize; vocabulary.len()];
        let mut counts: Vec<BTreeMap<usize, f64>> = Vec::with_capacity(n_docs);
        for tokens in &tokenized {
            let mut term_counts: BTreeMap<usize, f64> = BTreeMap::new();
            for token in tokens {
                if let Some(&index) = vocabulary.get(token) {
                    *term_counts.entry(index).or_insert(0.0) += 1.0;
                }
            }
            for &index in term_counts.keys() {
                document_frequency[index] += 1;
            }
            counts.push(term_counts);
        }

        // Smoothed idf, as if one extra document contained every term
        let idf: Vec<f64> = document_frequency
            .iter()
            .map(|&df| ((1 + n_docs) as f64 / (1 + df) as f64).ln() + 1.0)
            .collect();

        let vectors: Vec<Vec<(usize, f64)>> = counts
            .iter()
            .map(|term_counts| tfidf_vector(term_counts, &idf))
            .collect();

        let mut weights = vec![vec![0.0; vocabulary.len()]; n_classes];
        let mut bias = vec![0.0; n_classes];

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut order: Vec<usize> = (0..n_docs).collect();

        for _ in 0..config.epochs {
            order.shuffle(&mut rng);
            for &sample in &order {
                let vector = &vectors[sample];
                for class in 0..n_classes {
                    let label = if targets[sample] == class { 1.0 } else { -1.0 };
                    let score = sparse_dot(&weights[class], vector) + bias[class];

                    // L2 shrinkage on every step, hinge update on margin
                    // violations only
                    let decay = 1.0 - LEARNING_RATE * config.alpha;
                    for weight in weights[class].iter_mut() {
                        *weight *= decay;
                    }
                    if label * score < 1.0 {
                        for &(index, value) in vector {
                            weights[class][index] += LEARNING_RATE * label * value;
                        }
                        bias[class] += LEARNING_RATE * label;
                    }
                }
            }
        }

        Some(SectorClassifier {
            vocabulary,
            idf,
            weights,
            bias,
        })
    }

    /// Predicted class index; ties resolve to the lowest index.
    pub fn predict(&self, text: &str) -> usize {
        let mut term_counts: BTreeMap<usize, f64> = BTreeMap::new();
        for token in tokenize(text) {
            if let Some(&index) = self.vocabulary.get(&token) {
                *term_counts.entry(index).or_insert(0.0) += 1.0;
            }
        }
        let vector = tfidf_vector(&term_counts, &self.idf);

        let mut best = 0;
        let mut best_score = f64::NEG_INFINITY;
        for (class, class_weights) in self.weights.iter().enumerate() {
            let score = sparse_dot(class_weights, &vector) + self.bias[class];
            if score > best_score {
                best = class;
                best_score = score;
            }
        }
        best
    }
}

fn tfidf_vector(term_counts: &BTreeMap<usize, f64>, idf: &[f64]) -> Vec<(usize, f64)> {
    let mut vector: Vec<(usize, f64)> = term_counts
        .iter()
        .map(|(&index, &count)| (index, count * idf[index]))
        .collect();

    let norm = vector
        .iter()
        .map(|(_, value)| value * value)
        .sum::<f64>()
        .sqrt();
    if norm > 0.0 {
        for (_, value) in vector.iter_mut() {
            *value /= norm;
        }
    }
    vector
}

fn sparse_dot(dense: &[f64], sparse: &[(usize, f64)]) -> f64 {
    sparse
        .iter()
        .map(|&(index, value)| dense[index] * value)
        .sum()
}

// ============================================================================
// REGISTRY DRIVER
// ============================================================================

/// One classifier decision applied to the registry.
#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    pub business_id: i64,
    pub business_label: String,
    pub sector_id: i64,
    pub sector_code: String,
    pub sector_name: String,
}

/// Train on the curated corpus plus verified amenities, then assign a
/// DTI-NCCP sector to every unverified business matched by the filter
/// string. All updates commit in one transaction. An empty match set or an
/// unusable corpus is a logged no-op.
pub fn classify_unverified(
    conn: &mut Connection,
    raw_filter: &str,
    config: &ClassifierConfig,
) -> Result<Vec<Assignment>> {
    let rows = db::load_business_rows(conn)?;
    let unverified: Vec<_> = rows
        .into_iter()
        .filter(|row| !row.business.is_verified)
        .collect();

    let spec = FilterSpec::parse(raw_filter);
    let matched = spec.apply(unverified);
    if matched.is_empty() {
        info!("No unverified businesses matched the filter; nothing to classify");
        return Ok(Vec::new());
    }

    let sectors = db::sectors_nccp(conn)?;
    if sectors.is_empty() {
        warn!("No DTI-NCCP sectors defined; nothing to classify");
        return Ok(Vec::new());
    }

    // Corpus: curated texts per sector plus one synthetic document joining
    // the amenity names of verified businesses already carrying the sector.
    // Targets are the sector's position in id order.
    let mut documents = Vec::new();
    let mut targets = Vec::new();
    for (class, sector) in sectors.iter().enumerate() {
        for text in db::dataset_texts(conn, sector.id)? {
            documents.push(text);
            targets.push(class);
        }
        let amenity_document = db::amenity_names_for_verified_sector(conn, sector.id)?.join(" ");
        documents.push(amenity_document);
        targets.push(class);
    }

    let Some(model) = SectorClassifier::train(&documents, &targets, sectors.len(), config) else {
        warn!("Training corpus has no usable tokens; nothing to classify");
        return Ok(Vec::new());
    };

    let mut assignments = Vec::with_capacity(matched.len());
    for row in &matched {
        let amenities = db::amenity_names_for_business(conn, row.business.id)?.join(" ");
        let details = format!(
            "{} {}",
            amenities,
            row.sector_dti_files_name.as_deref().unwrap_or("")
        );
        let predicted = model.predict(&details);
        let sector = &sectors[predicted];
        assignments.push(Assignment {
            business_id: row.business.id,
            business_label: row.business.display_name(),
            sector_id: sector.id,
            sector_code: sector.code.clone(),
            sector_name: sector.name.clone(),
        });
    }

    let tx = conn.transaction()?;
    for assignment in &assignments {
        db::update_business_sector_nccp(&tx, assignment.business_id, assignment.sector_id)?;
        info!(
            "'{}' assigned to {}: '{}'",
            assignment.business_label, assignment.sector_code, assignment.sector_name
        );
    }
    tx.commit()?;

    Ok(assignments)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Business;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        conn
    }

    fn docs(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tokenize_lowercases_and_drops_short_tokens() {
        assert_eq!(
            tokenize("Bakery & Bread-Shop, est. 2016 (A)"),
            vec!["bakery", "bread", "shop", "est", "2016"]
        );
        assert!(tokenize("a & b").is_empty());
    }

    #[test]
    fn test_train_separable_classes() {
        let documents = docs(&[
            "bakery bread cakes pastry",
            "bread pandesal bakery",
            "hardware nails tools lumber",
            "tools hardware paint",
        ]);
        let targets = vec![0, 0, 1, 1];
        let model =
            SectorClassifier::train(&documents, &targets, 2, &ClassifierConfig::default()).unwrap();

        assert_eq!(model.predict("fresh bread from the bakery"), 0);
        assert_eq!(model.predict("nails and lumber"), 1);
    }

    #[test]
    fn test_training_is_deterministic() {
        let documents = docs(&[
            "bakery bread cakes",
            "hardware nails tools",
            "salon haircut beauty",
        ]);
        let targets = vec![0, 1, 2];
        let config = ClassifierConfig::default();

        let first = SectorClassifier::train(&documents, &targets, 3, &config).unwrap();
        let second = SectorClassifier::train(&documents, &targets, 3, &config).unwrap();

        for probe in ["bread cakes", "nails", "beauty haircut", "unrelated words"] {
            assert_eq!(first.predict(probe), second.predict(probe), "probe {}", probe);
        }
        assert_eq!(first.weights, second.weights);
        assert_eq!(first.bias, second.bias);
    }

    #[test]
    fn test_empty_corpus_yields_no_model() {
        assert!(SectorClassifier::train(&[], &[], 2, &ClassifierConfig::default()).is_none());

        // Documents with no usable tokens
        let documents = docs(&["a", "& *"]);
        let targets = vec![0, 1];
        assert!(
            SectorClassifier::train(&documents, &targets, 2, &ClassifierConfig::default())
                .is_none()
        );
    }

    fn seed_business(conn: &Connection, taxpayer: &str, verified: bool) -> i64 {
        let business = Business {
            id: 0,
            taxpayer_name: taxpayer.to_string(),
            business_name: Some(format!("{} Enterprises", taxpayer)),
            business_type: None,
            ownership_type: None,
            address: None,
            tel_number: None,
            barangay: None,
            capital: Some(10_000.0),
            status_id: None,
            sector_dti_files_id: None,
            sector_dti_nccp_id: None,
            division_id: None,
            year: 2016,
            is_verified: verified,
        };
        db::insert_business(conn, &business).unwrap()
    }

    #[test]
    fn test_classify_unverified_assigns_and_persists() {
        let mut conn = test_conn();

        let food = db::insert_sector_nccp(&conn, "Food Manufacturing", None, "C10").unwrap();
        let retail = db::insert_sector_nccp(&conn, "Retail Trade", None, "G47").unwrap();
        db::insert_dataset_text(&conn, food, "bakery bread pastry pandesal cakes").unwrap();
        db::insert_dataset_text(&conn, food, "noodle longganisa food processing").unwrap();
        db::insert_dataset_text(&conn, retail, "sari-sari store general merchandise retail").unwrap();
        db::insert_dataset_text(&conn, retail, "hardware store dry goods retail").unwrap();

        // A verified business enriches the food corpus through its amenities
        let verified = seed_business(&conn, "Verified Baker", true);
        conn.execute(
            "UPDATE businesses SET sector_dti_nccp_id = ?1 WHERE id = ?2",
            rusqlite::params![food, verified],
        )
        .unwrap();
        db::insert_amenity(&conn, verified, "Bakery").unwrap();

        let target = seed_business(&conn, "Unverified Baker", false);
        db::insert_amenity(&conn, target, "Bakery").unwrap();
        db::insert_amenity(&conn, target, "Bread and pastry").unwrap();

        let assignments =
            classify_unverified(&mut conn, "", &ClassifierConfig::default()).unwrap();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].business_id, target);
        assert_eq!(assignments[0].sector_id, food);
        assert_eq!(assignments[0].sector_code, "C10");

        let stored: Option<i64> = conn
            .query_row(
                "SELECT sector_dti_nccp_id FROM businesses WHERE id = ?1",
                rusqlite::params![target],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(stored, Some(food));
    }

    #[test]
    fn test_classify_empty_filter_set_is_noop() {
        let mut conn = test_conn();

        let food = db::insert_sector_nccp(&conn, "Food Manufacturing", None, "C10").unwrap();
        db::insert_dataset_text(&conn, food, "bakery bread").unwrap();
        seed_business(&conn, "Somebody", false);

        // Filter matches nothing
        let assignments =
            classify_unverified(&mut conn, "q=nothing-matches-this", &ClassifierConfig::default())
                .unwrap();
        assert!(assignments.is_empty());
    }

    #[test]
    fn test_classify_without_sectors_is_noop() {
        let mut conn = test_conn();
        seed_business(&conn, "Somebody", false);

        let assignments =
            classify_unverified(&mut conn, "", &ClassifierConfig::default()).unwrap();
        assert!(assignments.is_empty());
    }

    #[test]
    fn test_verified_businesses_are_never_reassigned() {
        let mut conn = test_conn();

        let food = db::insert_sector_nccp(&conn, "Food Manufacturing", None, "C10").unwrap();
        db::insert_dataset_text(&conn, food, "bakery bread pastry").unwrap();

        let verified = seed_business(&conn, "Verified Owner", true);
        db::insert_amenity(&conn, verified, "Bakery").unwrap();

        let assignments =
            classify_unverified(&mut conn, "", &ClassifierConfig::default()).unwrap();
        assert!(assignments.is_empty());
    }
}
