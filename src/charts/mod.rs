//! Charts module - static chart rendering

mod plotter;

pub use plotter::{render_box, render_heatmap, render_histogram, render_scatter};
