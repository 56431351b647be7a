//! Visualization utilities for lqr_rrt_star
//!
//! gnuplot rendering of planner trees, paths, occupancy grids and arm poses.
//! States are drawn on two chosen dimensions.

use gnuplot::{AutoOption, AxesCommon, Caption, Color, Figure, LineWidth, PointSize, PointSymbol};

use crate::arm_navigation::ArmValidityChecker;
use crate::common::{State, Trajectory};
use crate::path_planning::Tree;
use crate::utils::OccupancyGrid;

/// Plot colors
pub mod colors {
    pub const OBSTACLE: &str = "#000000";
    pub const START: &str = "#00A000";
    pub const GOAL: &str = "#0000FF";
    pub const PATH: &str = "#FF0000";
    pub const TREE: &str = "#C8C8C8";
    pub const ARM: &str = "#808080";
}

/// Color, width and legend entry of a polyline
#[derive(Debug, Clone)]
pub struct PathStyle {
    pub color: String,
    pub line_width: f64,
    pub caption: String,
}

impl PathStyle {
    pub fn new(color: &str, caption: &str) -> Self {
        PathStyle {
            color: color.to_string(),
            line_width: 2.0,
            caption: caption.to_string(),
        }
    }

    pub fn with_line_width(mut self, width: f64) -> Self {
        self.line_width = width;
        self
    }
}

pub struct Visualizer {
    figure: Figure,
    title: String,
    labels: (String, String),
    ranges: [Option<(f64, f64)>; 2],
    aspect_ratio: Option<f64>,
    dims: (usize, usize),
}

impl Visualizer {
    /// Draws dimensions 0 and 1 with equal axis scales
    pub fn new() -> Self {
        Visualizer {
            figure: Figure::new(),
            title: String::new(),
            labels: ("x".to_string(), "y".to_string()),
            ranges: [None, None],
            aspect_ratio: Some(1.0),
            dims: (0, 1),
        }
    }

    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = title.to_string();
        self
    }

    pub fn set_labels(&mut self, x: &str, y: &str) -> &mut Self {
        self.labels = (x.to_string(), y.to_string());
        self
    }

    pub fn set_x_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.ranges[0] = Some((min, max));
        self
    }

    pub fn set_y_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.ranges[1] = Some((min, max));
        self
    }

    /// `None` lets gnuplot scale the axes independently
    pub fn set_aspect_ratio(&mut self, ratio: Option<f64>) -> &mut Self {
        self.aspect_ratio = ratio;
        self
    }

    /// State dimensions used as plot axes
    pub fn set_projection(&mut self, x_dim: usize, y_dim: usize) -> &mut Self {
        self.dims = (x_dim, y_dim);
        self
    }

    /// Every tree edge as a thin segment between its endpoint states
    pub fn plot_tree(&mut self, tree: &Tree) -> &mut Self {
        let nodes = tree.nodes();
        let segments: Vec<[(f64, f64); 2]> = tree
            .edges()
            .map(|(parent, child)| [self.project(&nodes[parent].state), self.project(&nodes[child].state)])
            .collect();

        let axes = self.figure.axes2d();
        for [a, b] in segments {
            axes.lines(&[a.0, b.0], &[a.1, b.1], &[Color(colors::TREE), LineWidth(0.5)]);
        }
        self
    }

    pub fn plot_trajectory(&mut self, path: &Trajectory, style: &PathStyle) -> &mut Self {
        let points: Vec<(f64, f64)> = path.iter().map(|(s, _)| self.project(s)).collect();
        self.polyline(&points, style)
    }

    /// Occupied cells of a grid
    pub fn plot_grid(&mut self, grid: &OccupancyGrid) -> &mut Self {
        let (ox, oy) = grid.occupied_cells();
        self.figure.axes2d().points(
            &ox,
            &oy,
            &[Caption("Obstacles"), Color(colors::OBSTACLE), PointSymbol('S'), PointSize(0.5)],
        );
        self
    }

    /// Links of an arm configuration in grid coordinates
    pub fn plot_arm(&mut self, checker: &ArmValidityChecker, angles: &State, style: &PathStyle) -> &mut Self {
        self.polyline(&checker.joint_positions(angles), style)
    }

    pub fn plot_start(&mut self, state: &State) -> &mut Self {
        self.marker(state, colors::START, "Start")
    }

    pub fn plot_goal(&mut self, state: &State) -> &mut Self {
        self.marker(state, colors::GOAL, "Goal")
    }

    pub fn save_svg(&mut self, path: &str) -> Result<(), String> {
        self.apply_settings();
        self.figure.save_to_svg(path, 800, 600).map_err(|e| e.to_string())
    }

    fn project(&self, state: &State) -> (f64, f64) {
        (state[self.dims.0], state[self.dims.1])
    }

    fn polyline(&mut self, points: &[(f64, f64)], style: &PathStyle) -> &mut Self {
        let (x, y): (Vec<f64>, Vec<f64>) = points.iter().copied().unzip();
        self.figure.axes2d().lines(
            &x,
            &y,
            &[Caption(&style.caption), Color(&style.color), LineWidth(style.line_width)],
        );
        self
    }

    fn marker(&mut self, state: &State, color: &str, caption: &str) -> &mut Self {
        let (x, y) = self.project(state);
        self.figure.axes2d().points(
            &[x],
            &[y],
            &[Caption(caption), Color(color), PointSymbol('O'), PointSize(1.5)],
        );
        self
    }

    fn apply_settings(&mut self) {
        let axes = self.figure.axes2d();
        if !self.title.is_empty() {
            axes.set_title(&self.title, &[]);
        }
        axes.set_x_label(&self.labels.0, &[]);
        axes.set_y_label(&self.labels.1, &[]);
        if let Some((min, max)) = self.ranges[0] {
            axes.set_x_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        if let Some((min, max)) = self.ranges[1] {
            axes.set_y_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        if let Some(ratio) = self.aspect_ratio {
            axes.set_aspect_ratio(AutoOption::Fix(ratio));
        }
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_projection() {
        let vis = Visualizer::new();
        assert_eq!(vis.dims, (0, 1));
        assert_eq!(vis.aspect_ratio, Some(1.0));
        assert_eq!(vis.project(&State::from_vec(vec![1.0, 2.0, 3.0])), (1.0, 2.0));
    }

    #[test]
    fn test_projection_picks_dimensions() {
        let mut vis = Visualizer::new();
        vis.set_projection(2, 0);
        assert_eq!(vis.project(&State::from_vec(vec![1.0, 2.0, 3.0])), (3.0, 1.0));
    }

    #[test]
    fn test_ranges_and_labels() {
        let mut vis = Visualizer::new();
        vis.set_labels("x [km]", "z [km]").set_y_range(-1.0, 1.0);
        assert_eq!(vis.labels.1, "z [km]");
        assert_eq!(vis.ranges, [None, Some((-1.0, 1.0))]);
    }

    #[test]
    fn test_path_style() {
        let style = PathStyle::new(colors::PATH, "Path").with_line_width(3.0);
        assert_eq!(style.line_width, 3.0);
        assert_eq!(style.color, colors::PATH);
    }
}
