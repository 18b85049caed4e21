use serde::Serialize;

use crate::models::Graph;

/// Shape drawn on a list card while a graph has no points yet.
pub const PLACEHOLDER_VALUES: [f64; 6] = [1.0, 3.0, 2.0, 4.0, 3.0, 5.0];

/// Line chart input: `labels[i]` is the implicit x (`i + 1`) of `values[i]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub labels: Vec<u32>,
    pub values: Vec<f64>,
    pub placeholder: bool,
}

impl ChartSeries {
    /// y-axis range with the axis starting at zero unless data dips below it.
    pub fn y_bounds(&self) -> (f64, f64) {
        let (min, max) = self
            .values
            .iter()
            .fold((0.0f64, 0.0f64), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        if min == max { (min, min + 1.0) } else { (min, max) }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub fn index_labels(len: usize) -> Vec<u32> {
    (1..=len as u32).collect()
}

pub fn chart_series(graph: &Graph) -> ChartSeries {
    ChartSeries {
        title: graph.title.clone(),
        x_label: graph.x_label.clone(),
        y_label: graph.y_label.clone(),
        labels: index_labels(graph.data.len()),
        values: graph.data.clone(),
        placeholder: false,
    }
}

/// Like [`chart_series`], but substitutes [`PLACEHOLDER_VALUES`] for an empty
/// series.
pub fn preview_series(graph: &Graph) -> ChartSeries {
    if !graph.data.is_empty() {
        return chart_series(graph);
    }
    ChartSeries {
        labels: index_labels(PLACEHOLDER_VALUES.len()),
        values: PLACEHOLDER_VALUES.to_vec(),
        placeholder: true,
        ..chart_series(graph)
    }
}

#[cfg(test)]
mod tests {
    use crate::models::{Graph, GraphDefinition, GraphId};

    fn sample_graph(data: &[f64]) -> Graph {
        let mut graph = Graph::new(
            GraphId::from("1700000000000"),
            GraphDefinition {
                title: "Pushups".to_string(),
                x_label: "Day".to_string(),
                y_label: "Reps".to_string(),
                emoji: None,
            },
        );
        for value in data {
            graph.push_point(*value);
        }
        graph
    }

    #[test]
    fn labels_follow_insertion_index() {
        let series = super::chart_series(&sample_graph(&[10.0, 12.0, 15.0]));
        assert_eq!(series.labels, vec![1, 2, 3]);
        assert_eq!(series.values, vec![10.0, 12.0, 15.0]);
        assert_eq!(series.x_label, "Day");
        assert!(!series.placeholder);
    }

    #[test]
    fn empty_graph_previews_placeholder() {
        let graph = sample_graph(&[]);
        assert!(super::chart_series(&graph).is_empty());

        let preview = super::preview_series(&graph);
        assert!(preview.placeholder);
        assert_eq!(preview.values, super::PLACEHOLDER_VALUES.to_vec());
        assert_eq!(preview.labels.len(), super::PLACEHOLDER_VALUES.len());
        assert_eq!(preview.title, "Pushups");
    }

    #[test]
    fn y_bounds_start_at_zero() {
        let series = super::chart_series(&sample_graph(&[3.0, 8.0]));
        assert_eq!(series.y_bounds(), (0.0, 8.0));

        let negative = super::chart_series(&sample_graph(&[-2.0, 4.0]));
        assert_eq!(negative.y_bounds(), (-2.0, 4.0));

        let flat = super::chart_series(&sample_graph(&[]));
        assert_eq!(flat.y_bounds(), (0.0, 1.0));
    }
}
