use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand};
use parity_capture::capture::CaptureOptions;
use parity_capture::compare::{
    canonical_property_name, compare, compare_all, compare_samples, PropertyComparison,
    PropertySample,
};
use parity_capture::dom::{Document, NodeId, PageSnapshot};
use parity_capture::geometry::ClientPoint;
use parity_capture::hit_test::{hit_test, targets_floating_control, PointerInput};
use parity_capture::selection::{
    CancelPolicy, PointerButton, SelectionController, SelectionMode, SelectionOutcome,
    SelectionTarget, MIN_REGION_SIZE,
};
use parity_capture::surface::{CaptureSurface, ImageFileSurface, ScreencaptureSurface};
use parity_capture::viewport::Viewport;
use parity_capture::{CaptureOrchestrator, Screenshot};
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

const OPTIONS_HELP: &str = r##"Options JSON (every field optional):
{
  "element_margin": 40,
  "pad_to_aspect": true,
  "aspect": {"width": 16, "height": 9},
  "min_frame": {"width": 640, "height": 360},
  "padding_fill": "#F2F2F2",
  "highlight_color": "#FF3B30",
  "highlight_width": 3,
  "highlight_fill_alpha": 36,
  "highlighted_variant": true,
  "hidden_z_index_threshold": 2147483000
}

Notes:
- --at selects the element under a client point, --region drags x,y,w,h in client px, --full takes the visible surface.
- element captures write a plain PNG and a "-highlighted" PNG, each with a JSON sidecar.
- without --grab the viewport is grabbed with macOS screencapture -R, which needs
  "screen_origin": {"x", "y"} (client-area top-left in screen points) in the page viewport.
"##;

#[derive(Parser, Debug)]
#[command(
    name = "parity-capture",
    version,
    about = "Overlay-free page capture and tolerant design-property comparison"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print supported commands in JSON
    Commands,
    /// Hit-test a page snapshot at client coordinates, ignoring tool UI
    Pick(PickArgs),
    /// Capture an element, region or the visible surface of a page snapshot
    #[command(after_help = OPTIONS_HELP)]
    Capture(CaptureArgs),
    /// Compare implementation style values against design reference values
    Compare(CompareArgs),
}

#[derive(Args, Debug)]
struct PickArgs {
    /// Page snapshot JSON (element tree + viewport)
    #[arg(long)]
    page: PathBuf,
    /// Client point as "x,y"
    #[arg(long, allow_hyphen_values = true)]
    at: String,
}

#[derive(Args, Debug)]
struct CaptureArgs {
    /// Page snapshot JSON (element tree + viewport)
    #[arg(long)]
    page: PathBuf,
    /// Select the element under client point "x,y"
    #[arg(long, allow_hyphen_values = true, conflicts_with_all = ["region", "full"])]
    at: Option<String>,
    /// Select a client-space region "x,y,w,h"
    #[arg(long, allow_hyphen_values = true, conflicts_with = "full")]
    region: Option<String>,
    /// Capture the whole visible surface
    #[arg(long, action = ArgAction::SetTrue)]
    full: bool,
    /// Saved viewport grab to crop from (default: live screencapture of the
    /// viewport at its screen origin)
    #[arg(long)]
    grab: Option<PathBuf>,
    /// Capture options JSON path, or - for stdin
    #[arg(long)]
    options: Option<String>,
    /// Output root (default: $PARITY_OUT_DIR, $PARITY_TMP_DIR, .parity-capture)
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// Disable metadata sidecar generation
    #[arg(long, action = ArgAction::SetTrue)]
    no_sidecar: bool,
    /// Print capture metadata JSON to stdout
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
    /// Seconds to wait for a live screen grab
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// Implementation value, e.g. "rgb(255, 59, 48)"
    implementation: Option<String>,
    /// Reference value from the design file, e.g. "#FF3B30"
    reference: Option<String>,
    /// Property name for a single pair (enables font-weight keywords)
    #[arg(long)]
    property: Option<String>,
    /// JSON rows of {name, implementation, reference}, or an object with
    /// "implementation" and "reference" sample lists; - reads stdin
    #[arg(long, conflicts_with_all = ["implementation", "reference", "property"])]
    pairs: Option<String>,
    /// Exit non-zero when any property does not match
    #[arg(long, action = ArgAction::SetTrue)]
    strict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TargetSpec {
    Element { x: f64, y: f64 },
    Region { x: f64, y: f64, w: f64, h: f64 },
    Full,
}

impl TargetSpec {
    fn from_args(args: &CaptureArgs) -> Result<Self> {
        if args.full {
            return Ok(TargetSpec::Full);
        }
        if let Some(raw) = args.at.as_deref() {
            let (x, y) = parse_pair(raw)?;
            return Ok(TargetSpec::Element { x, y });
        }
        if let Some(raw) = args.region.as_deref() {
            let (x, y, w, h) = parse_quad(raw)?;
            return Ok(TargetSpec::Region { x, y, w, h });
        }
        bail!("choose a capture target with --at, --region or --full");
    }
}

#[derive(Debug, Deserialize)]
struct PairRow {
    name: String,
    implementation: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct SampleSets {
    implementation: Vec<PropertySample>,
    reference: Vec<PropertySample>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PairsInput {
    Rows(Vec<PairRow>),
    Samples(SampleSets),
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    match cli.command {
        Commands::Commands => print_commands(),
        Commands::Pick(args) => command_pick(args),
        Commands::Capture(args) => command_capture(args),
        Commands::Compare(args) => command_compare(args),
    }
}

fn init_tracing() -> Result<()> {
    // RUST_LOG overrides; stdout is reserved for JSON.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer()
        .with_timer(fmt::time::ChronoUtc::new(
            "%Y-%m-%d %H:%M:%S%.3f".to_string(),
        ))
        .with_target(false)
        .with_ansi(false)
        .with_writer(io::stderr);

    registry().with(env_filter).with(stderr_layer).try_init()?;
    Ok(())
}

fn print_commands() -> Result<()> {
    let rows = vec![
        json!({
            "name": "pick",
            "description": "Hit-test a page snapshot at a client point, ignoring the tool's own UI.",
        }),
        json!({
            "name": "capture",
            "description": "Capture an element, region or the visible surface with PNG + JSON sidecars.",
        }),
        json!({
            "name": "compare",
            "description": "Tolerant comparison of colors, dimensions, font lists and text.",
        }),
    ];

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "commands": rows }))?
    );
    Ok(())
}

fn command_pick(args: PickArgs) -> Result<()> {
    let (mut doc, viewport) = load_page(&args.page)?;
    let (x, y) = parse_pair(&args.at)?;
    let payload = pick_payload(&mut doc, &viewport, ClientPoint::new(x, y));
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn pick_payload(doc: &mut Document, viewport: &Viewport, client: ClientPoint) -> Value {
    let input = PointerInput::dispatched(doc, viewport, client);
    let mut highlight = None;
    let hit = hit_test(doc, viewport, &input, &mut highlight);

    json!({
        "client": client,
        "page": viewport.client_to_page(client),
        "floating_control": targets_floating_control(doc, viewport, &input),
        "hit": hit.map(|node| describe_node(doc, node)),
    })
}

fn describe_node(doc: &Document, node: NodeId) -> Value {
    json!({
        "node": node.index(),
        "tag": doc.tag(node),
        "attributes": doc.attributes(node),
        "rect": doc.rect(node),
    })
}

fn command_capture(args: CaptureArgs) -> Result<()> {
    let payloads = capture_to_dir(&args)?;

    if args.json {
        println!("{}", serde_json::to_string(&payloads)?);
    } else {
        for payload in &payloads {
            let output_path = payload
                .get("image_path")
                .and_then(Value::as_str)
                .unwrap_or_default();
            println!("{output_path}");
        }
    }
    Ok(())
}

fn capture_to_dir(args: &CaptureArgs) -> Result<Vec<Value>> {
    let (mut doc, viewport) = load_page(&args.page)?;
    let options = match args.options.as_deref() {
        Some(path) => load_options(path)?,
        None => CaptureOptions::default(),
    };

    let spec = TargetSpec::from_args(args)?;
    let target = select_target(&mut doc, &viewport, spec)?;
    debug!(?target, "selection finalized");

    let surface: Box<dyn CaptureSurface> = match &args.grab {
        Some(path) => Box::new(ImageFileSurface::new(path)),
        None => Box::new(ScreencaptureSurface::new(Duration::from_secs(
            args.timeout_secs,
        ))),
    };
    let mut orchestrator = CaptureOrchestrator::new(surface, options);
    let shots = orchestrator.capture(&mut doc, &viewport, &target)?;

    let captures_dir = out_root(args.out_dir.as_deref()).join("capture");
    let rand = rand::thread_rng().gen_range(1000..9999);
    let stem = format!(
        "capture-{}-{}-{}-{rand}",
        target_slug(&target),
        timestamp_compact(),
        std::process::id()
    );

    shots
        .iter()
        .map(|shot| write_screenshot(shot, &captures_dir, &stem, !args.no_sidecar))
        .collect()
}

/// Replays the pointer sequence a user would perform for `spec`.
fn select_target(
    doc: &mut Document,
    viewport: &Viewport,
    spec: TargetSpec,
) -> Result<SelectionTarget> {
    let mut controller = SelectionController::new();
    let policy = CancelPolicy::ReturnToIdle;

    let outcome = match spec {
        TargetSpec::Full => controller.begin(SelectionMode::FullSurface, policy),
        TargetSpec::Element { x, y } => {
            controller.begin(SelectionMode::Element, policy);
            let input = PointerInput::dispatched(doc, viewport, ClientPoint::new(x, y));
            if controller.pointer_move(input, viewport) {
                controller.animation_frame(doc, viewport);
            }
            controller.click(doc, viewport, input)
        }
        TargetSpec::Region { x, y, w, h } => {
            controller.begin(SelectionMode::Region, policy);
            let start = PointerInput::dispatched(doc, viewport, ClientPoint::new(x, y));
            let end = PointerInput::dispatched(doc, viewport, ClientPoint::new(x + w, y + h));
            controller.pointer_down(doc, viewport, start, PointerButton::Primary);
            controller.pointer_move(end, viewport);
            controller.pointer_up(viewport, end)
        }
    };

    match (outcome, spec) {
        (SelectionOutcome::Finalized(target), _) => Ok(target),
        (SelectionOutcome::Discarded, _) => {
            bail!("region must exceed {MIN_REGION_SIZE}px on both axes")
        }
        (_, TargetSpec::Element { x, y }) => {
            bail!("no selectable page element at {x},{y}")
        }
        (other, _) => bail!("selection did not finalize: {other:?}"),
    }
}

fn target_slug(target: &SelectionTarget) -> &'static str {
    match target {
        SelectionTarget::Element { .. } => "element",
        SelectionTarget::Region(_) => "region",
        SelectionTarget::FullSurface => "full",
    }
}

fn write_screenshot(
    shot: &Screenshot,
    dir: &Path,
    stem: &str,
    with_sidecar: bool,
) -> Result<Value> {
    let file_name = if shot.highlighted {
        format!("{stem}-highlighted.png")
    } else {
        format!("{stem}.png")
    };
    let out_path = dir.join(file_name);
    ensure_parent_dir(&out_path)?;
    shot.pixels
        .save(&out_path)
        .with_context(|| format!("failed to write capture: {}", out_path.display()))?;

    let sidecar_path = with_sidecar.then(|| default_sidecar_for(&out_path));
    let mut payload = shot.sidecar();
    if let Value::Object(map) = &mut payload {
        map.insert(
            "image_path".to_string(),
            json!(abs_path(&out_path).display().to_string()),
        );
        map.insert(
            "sidecar_path".to_string(),
            json!(sidecar_path
                .as_ref()
                .map(|p| abs_path(p).display().to_string())),
        );
        map.insert("capture_tool".to_string(), json!("parity-capture capture"));
    }

    if let Some(path) = &sidecar_path {
        write_json_pretty(path, &payload)?;
    }
    Ok(payload)
}

fn command_compare(args: CompareArgs) -> Result<()> {
    let (payload, mismatches, total) = if let Some(path) = args.pairs.as_deref() {
        let input = load_pairs(path)?;
        let comparisons = compare_pairs(input);
        let matched = comparisons.iter().filter(|c| c.result.is_match).count();
        let total = comparisons.len();
        let payload = json!({
            "matched": matched,
            "total": total,
            "comparisons": comparisons,
        });
        (payload, total - matched, total)
    } else {
        let (Some(implementation), Some(reference)) =
            (args.implementation.as_deref(), args.reference.as_deref())
        else {
            bail!("compare needs <IMPLEMENTATION> <REFERENCE> or --pairs <file>");
        };
        let result = match args.property.as_deref() {
            Some(name) => compare_samples(
                &PropertySample::new(name, implementation),
                &PropertySample::new(name, reference),
            ),
            None => compare(implementation, reference),
        };
        let mismatches = usize::from(!result.is_match);
        let payload = json!({
            "property": args.property.as_deref().map(canonical_property_name),
            "implementation": implementation,
            "reference": reference,
            "result": result,
        });
        (payload, mismatches, 1)
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    if args.strict && mismatches > 0 {
        bail!("{mismatches} of {total} properties did not match");
    }
    Ok(())
}

fn compare_pairs(input: PairsInput) -> Vec<PropertyComparison> {
    match input {
        PairsInput::Rows(rows) => rows
            .into_iter()
            .map(|row| {
                let result = compare_samples(
                    &PropertySample::new(&row.name, &row.implementation),
                    &PropertySample::new(&row.name, &row.reference),
                );
                PropertyComparison {
                    name: canonical_property_name(&row.name),
                    implementation: Some(row.implementation),
                    reference: Some(row.reference),
                    result,
                }
            })
            .collect(),
        PairsInput::Samples(sets) => compare_all(&sets.implementation, &sets.reference),
    }
}

fn load_page(path: &Path) -> Result<(Document, Viewport)> {
    let snapshot = PageSnapshot::load(path)?;
    Ok(snapshot.into_document())
}

fn load_options(path: &str) -> Result<CaptureOptions> {
    let raw = read_input(path, "options")?;
    CaptureOptions::from_json(&raw).context("invalid options JSON")
}

fn load_pairs(path: &str) -> Result<PairsInput> {
    let raw = read_input(path, "pairs")?;
    serde_json::from_str(&raw).context(
        "pairs must be a list of {name, implementation, reference} or an object with implementation/reference samples",
    )
}

fn read_input(path: &str, what: &str) -> Result<String> {
    if path == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .with_context(|| format!("failed to read {what} from stdin"))?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {what} file: {path}"))
}

fn parse_numbers(raw: &str, expected: usize, shape: &str) -> Result<Vec<f64>> {
    let values = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("expected {shape}, got '{raw}'"))?;
    if values.len() != expected || values.iter().any(|v| !v.is_finite()) {
        bail!("expected {shape}, got '{raw}'");
    }
    Ok(values)
}

fn parse_pair(raw: &str) -> Result<(f64, f64)> {
    let v = parse_numbers(raw, 2, "x,y")?;
    Ok((v[0], v[1]))
}

fn parse_quad(raw: &str) -> Result<(f64, f64, f64, f64)> {
    let v = parse_numbers(raw, 4, "x,y,w,h")?;
    Ok((v[0], v[1], v[2], v[3]))
}

fn write_json_pretty(path: &Path, value: &Value) -> Result<()> {
    ensure_parent_dir(path)?;
    let raw = serde_json::to_string_pretty(value)?;
    fs::write(path, raw).with_context(|| format!("failed to write JSON: {}", path.display()))?;
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create parent directory: {}", parent.display())
            })?;
        }
    }
    Ok(())
}

fn default_sidecar_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string();
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!("{stem}.json"))
}

fn out_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    env::var("PARITY_OUT_DIR")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            env::var("PARITY_TMP_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| PathBuf::from(".parity-capture"))
}

fn abs_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(path)
}

fn timestamp_compact() -> String {
    Utc::now().format("%Y%m%d-%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::{tempdir, TempDir};

    const PAGE: &str = r#"{
        "viewport": {"url": "https://shop.test/", "width": 400, "height": 300},
        "body": {
            "tag": "body",
            "rect": {"x": 0, "y": 0, "width": 400, "height": 300},
            "children": [
                {"tag": "button", "attributes": {"id": "buy"},
                 "rect": {"x": 100, "y": 100, "width": 80, "height": 40}},
                {"tag": "div", "attributes": {"data-parity-ui": "host"},
                 "rect": {"x": 0, "y": 0, "width": 400, "height": 300},
                 "style": {"position": "fixed", "z-index": 2147483647},
                 "shadow": [
                    {"tag": "div", "attributes": {"data-parity-ui": "floating-control"},
                     "rect": {"x": 340, "y": 240, "width": 50, "height": 50},
                     "style": {"position": "fixed"}}
                 ]}
            ]
        }
    }"#;

    fn fixture() -> (TempDir, PathBuf, PathBuf) {
        let dir = tempdir().unwrap();
        let page = dir.path().join("page.json");
        fs::write(&page, PAGE).unwrap();
        let grab = dir.path().join("grab.png");
        RgbaImage::from_fn(400, 300, |x, y| Rgba([x as u8, y as u8, 200, 255]))
            .save(&grab)
            .unwrap();
        (dir, page, grab)
    }

    fn capture_args(page: &Path, grab: &Path, out: &Path) -> CaptureArgs {
        CaptureArgs {
            page: page.to_path_buf(),
            at: None,
            region: None,
            full: false,
            grab: Some(grab.to_path_buf()),
            options: None,
            out_dir: Some(out.to_path_buf()),
            no_sidecar: false,
            json: false,
            timeout_secs: 1,
        }
    }

    #[test]
    fn parses_points_and_regions() {
        assert_eq!(parse_pair("10, 20.5").unwrap(), (10.0, 20.5));
        assert_eq!(parse_quad("-5,0,30,40").unwrap(), (-5.0, 0.0, 30.0, 40.0));
        assert!(parse_pair("10").is_err());
        assert!(parse_quad("1,2,3,x").is_err());
        assert!(parse_pair("NaN,1").is_err());
    }

    #[test]
    fn explicit_out_dir_wins() {
        assert_eq!(
            out_root(Some(Path::new("/tmp/parity"))),
            PathBuf::from("/tmp/parity")
        );
    }

    #[test]
    fn sidecar_lands_beside_capture_in_fresh_dirs() {
        let dir = tempdir().unwrap();
        let png = dir.path().join("run-1").join("element-buy-highlighted.png");
        let sidecar = default_sidecar_for(&png);
        assert_eq!(sidecar, dir.path().join("run-1").join("element-buy-highlighted.json"));

        write_json_pretty(&sidecar, &json!({"kind": "element", "highlighted": true})).unwrap();
        let raw = fs::read_to_string(&sidecar).unwrap();
        assert!(raw.contains('\n'));
        let back: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(back["kind"], "element");
    }

    #[test]
    fn options_file_overrides_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("options.json");
        fs::write(&path, r#"{"pad_to_aspect": false, "highlight_width": 5}"#).unwrap();
        let options = load_options(path.to_str().unwrap()).unwrap();
        assert!(!options.pad_to_aspect);
        assert_eq!(options.highlight_width, 5);
        assert_eq!(options.element_margin, 40.0);
    }

    #[test]
    fn pick_skips_overlay_and_reports_page_element() {
        let (_dir, page, _) = fixture();
        let (mut doc, viewport) = load_page(&page).unwrap();
        let payload = pick_payload(&mut doc, &viewport, ClientPoint::new(120.0, 110.0));
        assert_eq!(payload["hit"]["tag"], "button");
        assert_eq!(payload["hit"]["attributes"]["id"], "buy");
        assert_eq!(payload["floating_control"], false);

        let on_control = pick_payload(&mut doc, &viewport, ClientPoint::new(360.0, 260.0));
        assert!(on_control["hit"].is_null());
        assert_eq!(on_control["floating_control"], true);
    }

    #[test]
    fn element_capture_writes_plain_and_highlighted_with_sidecars() {
        let (dir, page, grab) = fixture();
        let out = dir.path().join("out");
        let mut args = capture_args(&page, &grab, &out);
        args.at = Some("120,110".to_string());

        let payloads = capture_to_dir(&args).unwrap();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0]["highlighted"], false);
        assert_eq!(payloads[1]["highlighted"], true);
        assert_eq!(payloads[0]["kind"], "element");
        assert_eq!(payloads[0]["image_size"]["w"], 640);
        assert_eq!(payloads[0]["image_size"]["h"], 360);

        for payload in &payloads {
            let image = PathBuf::from(payload["image_path"].as_str().unwrap());
            let sidecar = PathBuf::from(payload["sidecar_path"].as_str().unwrap());
            assert!(image.exists());
            assert!(sidecar.exists());
            assert!(image.starts_with(out.join("capture")));
        }
        let highlighted = payloads[1]["image_path"].as_str().unwrap();
        assert!(highlighted.ends_with("-highlighted.png"));
    }

    #[test]
    fn region_capture_without_sidecar() {
        let (dir, page, grab) = fixture();
        let out = dir.path().join("out");
        let mut args = capture_args(&page, &grab, &out);
        args.region = Some("10,10,200,100".to_string());
        args.no_sidecar = true;

        let payloads = capture_to_dir(&args).unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0]["kind"], "region");
        assert!(payloads[0]["sidecar_path"].is_null());
    }

    #[test]
    fn tiny_region_is_rejected() {
        let (dir, page, grab) = fixture();
        let mut args = capture_args(&page, &grab, dir.path());
        args.region = Some("10,10,5,50".to_string());
        let err = capture_to_dir(&args).unwrap_err();
        assert!(format!("{err:#}").contains("must exceed"));
    }

    #[test]
    fn click_on_floating_control_selects_nothing() {
        let (dir, page, grab) = fixture();
        let mut args = capture_args(&page, &grab, dir.path());
        args.at = Some("360,260".to_string());
        let err = capture_to_dir(&args).unwrap_err();
        assert!(format!("{err:#}").contains("no selectable page element"));
    }

    #[test]
    fn missing_target_flag_is_an_error() {
        let (dir, page, grab) = fixture();
        let args = capture_args(&page, &grab, dir.path());
        assert!(TargetSpec::from_args(&args).is_err());
    }

    #[test]
    fn pairs_rows_and_sample_sets_both_parse() {
        let rows: PairsInput = serde_json::from_str(
            r##"[
                {"name": "color", "implementation": "rgb(255, 59, 48)", "reference": "#FF3B30"},
                {"name": "fontWeight", "implementation": "bold", "reference": "700"},
                {"name": "padding", "implementation": "16px", "reference": "24px"}
            ]"##,
        )
        .unwrap();
        let results = compare_pairs(rows);
        assert_eq!(results.len(), 3);
        assert!(results[0].result.is_match);
        assert_eq!(results[1].name, "font-weight");
        assert!(results[1].result.is_match);
        assert!(!results[2].result.is_match);

        let sets: PairsInput = serde_json::from_str(
            r#"{
                "implementation": [{"name": "font-family", "raw_value": "Inter, sans-serif"}],
                "reference": [{"name": "fontFamily", "raw_value": "\"Inter\""}]
            }"#,
        )
        .unwrap();
        let results = compare_pairs(sets);
        assert_eq!(results.len(), 1);
        assert!(results[0].result.is_match);
    }
}
