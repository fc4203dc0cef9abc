//! Monthly series charts rendered with `pyxplot` and framed with `mogrify`.

use std::ffi::OsStr;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveTime;
use tally_core::config::DigestConfig;
use tally_core::digest::{ChartError, ChartRenderer};
use tally_core::MonthlyPoint;
use tokio::process::Command;
use tracing::debug;

const BORDER: &str = "100x100";

#[derive(Clone, Debug)]
pub struct PyxplotChartRenderer {
    pyxplot: PathBuf,
    mogrify: PathBuf,
}

impl Default for PyxplotChartRenderer {
    fn default() -> Self {
        Self { pyxplot: PathBuf::from("pyxplot"), mogrify: PathBuf::from("mogrify") }
    }
}

impl PyxplotChartRenderer {
    /// Explicit paths win; otherwise both tools are looked up on `PATH`.
    pub fn new(pyxplot: Option<PathBuf>, mogrify: Option<PathBuf>) -> Self {
        let defaults = Self::default();
        Self {
            pyxplot: pyxplot.unwrap_or(defaults.pyxplot),
            mogrify: mogrify.unwrap_or(defaults.mogrify),
        }
    }

    pub fn from_config(config: &DigestConfig) -> Self {
        Self::new(config.pyxplot_path.clone(), config.mogrify_path.clone())
    }
}

#[async_trait]
impl ChartRenderer for PyxplotChartRenderer {
    async fn render(&self, title: &str, points: &[MonthlyPoint]) -> Result<Vec<u8>, ChartError> {
        let workdir = tempfile::tempdir().map_err(|error| render_error("tempdir", error))?;
        let script_path = workdir.path().join("chart.ppl");
        let output_path = workdir.path().join("chart.png");

        tokio::fs::write(&script_path, plot_script(title, points, &output_path))
            .await
            .map_err(|error| render_error("write script", error))?;

        run(&self.pyxplot, &[script_path.as_os_str()]).await?;
        run(
            &self.mogrify,
            &[
                OsStr::new("-bordercolor"),
                OsStr::new("white"),
                OsStr::new("-border"),
                OsStr::new(BORDER),
                output_path.as_os_str(),
            ],
        )
        .await?;

        let bytes = tokio::fs::read(&output_path)
            .await
            .map_err(|error| render_error("read chart", error))?;
        debug!(event_name = "chart.render.finished", title, bytes = bytes.len(), "chart rendered");
        Ok(bytes)
    }
}

async fn run(program: &Path, args: &[&OsStr]) -> Result<(), ChartError> {
    let output = Command::new(program).args(args).output().await.map_err(|error| {
        ChartError::Render(format!("failed to start `{}`: {error}", program.display()))
    })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ChartError::Render(format!(
            "`{}` exited with {}: {}",
            program.display(),
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}

fn render_error(step: &str, error: std::io::Error) -> ChartError {
    ChartError::Render(format!("{step}: {error}"))
}

fn month_epoch(point: &MonthlyPoint) -> i64 {
    point.month.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// Pyxplot script plotting counts on the right axis and the score on the left.
/// Data blocks follow the order of the plot clauses.
pub fn plot_script(title: &str, points: &[MonthlyPoint], output: &Path) -> String {
    let mut script = String::new();
    let _ = writeln!(script, "set terminal png dpi 600");
    let _ = writeln!(script, "set output \"{}\"", output.display());
    let _ = writeln!(script, "set title \"{}\"", title.replace('"', "'"));
    let _ = writeln!(script, "set width 11");
    let _ = writeln!(script, "set xlabel \"Month\"");
    let _ = writeln!(script, "set ylabel \"Score [\\%]\"");
    let _ = writeln!(script, "set y2label \"Count [\\#]\"");
    let _ = writeln!(script, "set key above");
    let _ = writeln!(script, "set keycolumns 3");
    let _ = writeln!(script, "set yrange [0:100]");
    let _ = writeln!(script, "set y2range [0:*]");

    let tics: Vec<String> = points
        .iter()
        .map(|point| format!("\"{}\" {}", point.month.format("%b"), month_epoch(point)))
        .collect();
    let _ = writeln!(script, "set xtics ({})", tics.join(", "));

    let _ = writeln!(
        script,
        "plot '--' using time.fromUnix($1):2 title 'Comment Count' with linespoints lw 2 pt 3 c Apricot axes xy2, \\"
    );
    let _ = writeln!(
        script,
        "     '--' using time.fromUnix($1):2 title 'Feedback Count' with linespoints lw 2 pt 4 c CarnationPink axes xy2, \\"
    );
    let _ = writeln!(
        script,
        "     '--' using time.fromUnix($1):2 title 'Feedback Score' with linespoints lw 2 pt 2 c Cerulean"
    );

    for point in points {
        let _ = writeln!(script, "{},{}", month_epoch(point), point.comment_count);
    }
    let _ = writeln!(script, "END");
    for point in points {
        let _ = writeln!(script, "{},{}", month_epoch(point), point.response_count);
    }
    let _ = writeln!(script, "END");
    for point in points {
        let _ = writeln!(script, "{},{:.6}", month_epoch(point), point.approval_pct);
    }
    let _ = writeln!(script, "END");
    script
}
