pub mod classifier_trait;
pub mod decision_tree;
pub mod factory;
pub mod gbdt;
pub mod logistic;
pub mod random_forest;

pub use classifier_trait::{
    labels_from_proba, ClassifierModel, FeatureImportance, DECISION_THRESHOLD,
};
pub use factory::{build_model, load_model};
