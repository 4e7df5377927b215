//! Случайный лес регрессионных деревьев

#![allow(non_snake_case)]

use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{ForecastError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

/// Регрессионное дерево: полный перебор порогов по всем признакам,
/// критерий - уменьшение суммы квадратов отклонений.
#[derive(Debug, Clone)]
pub struct RegressionTree {
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    root: Option<TreeNode>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    sse: f64,
}

impl RegressionTree {
    pub fn new(max_depth: Option<usize>, min_samples_split: usize, min_samples_leaf: usize) -> Self {
        Self {
            max_depth,
            min_samples_split: min_samples_split.max(2),
            min_samples_leaf: min_samples_leaf.max(1),
            root: None,
        }
    }

    pub fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fit_indices(X, y, (0..X.nrows()).collect())
    }

    /// Обучение на подвыборке строк (индексы могут повторяться)
    pub fn fit_indices(&mut self, X: &Array2<f64>, y: &Array1<f64>, indices: Vec<usize>) -> Result<()> {
        if X.nrows() != y.len() {
            return Err(ForecastError::Model(format!(
                "{} feature rows but {} targets",
                X.nrows(),
                y.len()
            )));
        }
        if indices.is_empty() {
            return Err(ForecastError::Model("Empty dataset".to_string()));
        }

        self.root = Some(self.build_tree(X, y, 0, indices));
        Ok(())
    }

    fn build_tree(&self, X: &Array2<f64>, y: &Array1<f64>, depth: usize, indices: Vec<usize>) -> TreeNode {
        let mean = indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64;

        let depth_reached = self.max_depth.map_or(false, |max| depth >= max);
        if depth_reached || indices.len() < self.min_samples_split {
            return TreeNode::Leaf { value: mean };
        }

        let current_sse: f64 = indices.iter().map(|&i| (y[i] - mean).powi(2)).sum();
        if current_sse < 1e-12 {
            return TreeNode::Leaf { value: mean };
        }

        let best = match self.find_best_split(X, y, &indices) {
            Some(best) if best.sse < current_sse => best,
            _ => return TreeNode::Leaf { value: mean },
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| X[[i, best.feature]] <= best.threshold);

        TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(self.build_tree(X, y, depth + 1, left_indices)),
            right: Box::new(self.build_tree(X, y, depth + 1, right_indices)),
        }
    }

    fn find_best_split(&self, X: &Array2<f64>, y: &Array1<f64>, indices: &[usize]) -> Option<BestSplit> {
        let n = indices.len();
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();

        let mut best: Option<BestSplit> = None;
        let mut sorted = indices.to_vec();

        for feature in 0..X.ncols() {
            sorted.sort_by(|&a, &b| X[[a, feature]].total_cmp(&X[[b, feature]]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for pos in 0..n - 1 {
                let yi = y[sorted[pos]];
                left_sum += yi;
                left_sq += yi * yi;

                let left_n = pos + 1;
                let right_n = n - left_n;
                if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                    continue;
                }

                let current = X[[sorted[pos], feature]];
                let next = X[[sorted[pos + 1], feature]];
                if next - current < 1e-12 {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / left_n as f64)
                    + (right_sq - right_sum * right_sum / right_n as f64);

                if best.as_ref().map_or(true, |b| sse < b.sse) {
                    best = Some(BestSplit {
                        feature,
                        threshold: (current + next) / 2.0,
                        sse,
                    });
                }
            }
        }

        best
    }

    pub fn predict_row(&self, x: ArrayView1<f64>) -> Result<f64> {
        let mut node = self
            .root
            .as_ref()
            .ok_or_else(|| ForecastError::Model("Tree not trained".to_string()))?;
        loop {
            match node {
                TreeNode::Leaf { value } => return Ok(*value),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if x[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        let mut predictions = Array1::<f64>::zeros(X.nrows());
        for (i, row) in X.rows().into_iter().enumerate() {
            predictions[i] = self.predict_row(row)?;
        }
        Ok(predictions)
    }
}

/// Ансамбль деревьев на бутстрап-выборках. Дерево `i` использует
/// `StdRng::seed_from_u64(seed + i)`, поэтому результат детерминирован.
#[derive(Debug, Clone)]
pub struct RandomForestRegressor {
    params: ForestParams,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl RandomForestRegressor {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    pub fn is_trained(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if self.params.n_estimators == 0 {
            return Err(ForecastError::Model("n_estimators must be positive".to_string()));
        }
        let n_samples = X.nrows();
        if n_samples == 0 || X.ncols() == 0 {
            return Err(ForecastError::Model("Empty dataset".to_string()));
        }

        let mut trees = Vec::with_capacity(self.params.n_estimators);
        for i in 0..self.params.n_estimators {
            let mut rng = StdRng::seed_from_u64(self.params.seed.wrapping_add(i as u64));
            let sample: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();

            let mut tree = RegressionTree::new(
                self.params.max_depth,
                self.params.min_samples_split,
                self.params.min_samples_leaf,
            );
            tree.fit_indices(X, y, sample)?;
            trees.push(tree);
        }

        self.trees = trees;
        self.n_features = X.ncols();
        Ok(())
    }

    /// Среднее предсказание деревьев
    pub fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_trained() {
            return Err(ForecastError::Model("Model not trained".to_string()));
        }
        if X.ncols() != self.n_features {
            return Err(ForecastError::Model(format!(
                "expected {} features, got {}",
                self.n_features,
                X.ncols()
            )));
        }

        let mut sum = Array1::<f64>::zeros(X.nrows());
        for tree in &self.trees {
            sum += &tree.predict(X)?;
        }
        Ok(sum / self.trees.len() as f64)
    }
}
