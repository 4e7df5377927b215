/// ML модели

pub mod forest;
pub mod trainer;

pub use forest::{ForestParams, RandomForestRegressor, RegressionTree};
pub use trainer::{Evaluation, ModelTrainer, TrainedModel, TrainingOutcome};
