use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use log::{error, info};
use serde_json::json;

use odd_one_out::render::{backdrop, GifRenderer, TerminalRenderer};
use odd_one_out::{
    fixations_to_find, global_saliency_index, max_saliency_ratio_background,
    max_saliency_ratio_target, Error, FrameRenderer, Image, LumaImage, MapSource, Result,
    ScoreOptions, SearchOptions, Size, TieBreak,
};

#[derive(Parser)]
#[command(version, about = "Saliency metrics for odd-one-out targets")]
struct Cli {
    /// Print results as a JSON object
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Global Saliency Index of the target against the distractors
    Gsi {
        salmap: PathBuf,
        targmap: PathBuf,
        distmap: PathBuf,
        #[command(flatten)]
        noise: NoiseArgs,
    },
    /// Peak target saliency over peak distractor saliency
    MsrTarg(ScoreArgs),
    /// Peak background saliency over peak target saliency
    MsrBg(ScoreArgs),
    /// Number of fixations needed to find the target
    Numfix(NumfixArgs),
}

#[derive(Args)]
struct NoiseArgs {
    /// Add tiny random noise to the saliency map to break ties
    #[arg(long)]
    add_eps: bool,
    /// Seed for --add-eps noise
    #[arg(long, requires = "add_eps")]
    seed: Option<u64>,
}

impl NoiseArgs {
    fn tie_break(&self) -> TieBreak {
        TieBreak::from_flags(self.add_eps, self.seed)
    }
}

#[derive(Args)]
struct ScoreArgs {
    salmap: PathBuf,
    targmap: PathBuf,
    distmap: PathBuf,
    /// Pixels of disk dilation applied to the target and distractor masks
    #[arg(short, long, default_value_t = 0)]
    dilate: usize,
    #[command(flatten)]
    noise: NoiseArgs,
}

#[derive(Clone, Copy, Debug)]
struct Circle {
    x: f64,
    y: f64,
    diameter: f64,
}

#[derive(Args)]
struct NumfixArgs {
    salmap: PathBuf,
    #[arg(required_unless_present = "target_circle")]
    targmap: Option<PathBuf>,
    /// Width,height of the region inhibited around each fixation
    #[arg(long, value_parser = parse_size)]
    iorrec: Size,
    /// Width,height of the box around a fixation that counts as a hit
    #[arg(long, value_parser = parse_size, default_value = "1,1")]
    find_box: Size,
    /// Attenuate the inhibited region radially instead of zeroing it
    #[arg(long)]
    gaussian: bool,
    #[arg(short, long, default_value_t = 0)]
    dilate: usize,
    /// Give up after this many fixations; 0 searches until nothing is left
    #[arg(short, long, default_value_t = 0)]
    max_tries: usize,
    #[command(flatten)]
    noise: NoiseArgs,
    /// Build the target mask as a filled circle x,y,diameter instead of reading targmap
    #[arg(long, value_parser = parse_circle, conflicts_with = "targmap")]
    target_circle: Option<Circle>,
    /// Stimulus image shown next to the maps when visualizing
    #[arg(long)]
    image: Option<PathBuf>,
    /// Play the search in the terminal
    #[arg(long)]
    visualize: bool,
    /// Panel width in characters for --visualize
    #[arg(long, default_value_t = 40)]
    columns: u32,
    /// Record the search as an animated gif
    #[arg(long, conflicts_with = "visualize")]
    record: Option<PathBuf>,
    #[arg(long, default_value_t = 10.0)]
    fps: f64,
}

fn parse_numbers<const N: usize>(s: &str) -> std::result::Result<[f64; N], String> {
    let values: Vec<f64> = s
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("{:?}: {}", v, e)))
        .collect::<std::result::Result<_, _>>()?;
    values
        .try_into()
        .map_err(|v: Vec<f64>| format!("expected {} comma separated values, got {}", N, v.len()))
}

fn parse_size(s: &str) -> std::result::Result<Size, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    match parts[..] {
        [width, height] => {
            let parse = |v: &str| v.parse::<usize>().map_err(|e| format!("{:?}: {}", v, e));
            Ok(Size::new(parse(width)?, parse(height)?))
        }
        _ => Err(format!("expected width,height, got {:?}", s)),
    }
}

fn parse_circle(s: &str) -> std::result::Result<Circle, String> {
    let [x, y, diameter] = parse_numbers::<3>(s)?;
    Ok(Circle { x, y, diameter })
}

fn print_score(json: bool, metric: &str, score: f64) {
    if json {
        println!("{}", json!({ "metric": metric, "score": score, "defined": score != odd_one_out::SENTINEL }));
    } else {
        println!("{}: {}", metric, score);
    }
}

fn score_options(args: &ScoreArgs) -> ScoreOptions {
    info!("dilate\t{}", args.dilate);
    info!("add eps\t{}", args.noise.add_eps);
    ScoreOptions {
        dilate: args.dilate,
        tie_break: args.noise.tie_break(),
    }
}

fn log_paths(salmap: &Path, targmap: &Path, distmap: &Path) {
    info!("salmap path\t{:?}", salmap);
    info!("targmap path\t{:?}", targmap);
    info!("distmap path\t{:?}", distmap);
}

fn numfix(args: &NumfixArgs, json: bool) -> Result<()> {
    info!("salmap path\t{:?}", args.salmap);
    info!("iorrec\t{:?}", args.iorrec);
    info!("find box\t{:?}", args.find_box);
    info!("gaussian\t{}", args.gaussian);
    info!("dilate\t{}", args.dilate);
    info!("max tries\t{}", args.max_tries);
    info!("add eps\t{}", args.noise.add_eps);

    let salmap = LumaImage::open_grayscale(&args.salmap)?;
    let targmap = match (&args.targmap, args.target_circle) {
        (_, Some(circle)) => {
            info!("target circle\t{:?}", circle);
            let (width, height) = salmap.get_dimensions();
            let radius = (circle.diameter / 2.).trunc();
            MapSource::from(LumaImage::circle_mask(width, height, circle.x, circle.y, radius))
        }
        (Some(path), None) => {
            info!("targmap path\t{:?}", path);
            MapSource::from(path.clone())
        }
        (None, None) => {
            return Err(Error::InvalidArgument(String::from(
                "either a target mask or --target-circle is required",
            )))
        }
    };

    let mut renderer: Option<Box<dyn FrameRenderer>> = if args.visualize || args.record.is_some() {
        let image = match &args.image {
            Some(path) => {
                info!("image path\t{:?}", path);
                Some(::image::open(path)?)
            }
            None => None,
        };
        let image = backdrop(image.as_ref(), &salmap);
        match &args.record {
            Some(path) => {
                info!("record path\t{:?}", path);
                Some(Box::new(GifRenderer::new(image, path, 256, args.fps)?) as Box<dyn FrameRenderer>)
            }
            None => Some(Box::new(TerminalRenderer::new(
                image,
                args.columns,
                Duration::from_millis(100),
                Duration::from_secs(5),
            )) as Box<dyn FrameRenderer>),
        }
    } else {
        None
    };

    let options = SearchOptions {
        find_box: args.find_box,
        gaussian: args.gaussian,
        dilate: args.dilate,
        max_tries: args.max_tries,
        tie_break: args.noise.tie_break(),
    };
    let outcome = fixations_to_find(
        &MapSource::from(salmap),
        &targmap,
        args.iorrec,
        &options,
        renderer.as_mut().map(|r| r.as_mut() as &mut dyn FrameRenderer),
    )?;

    if json {
        println!("{}", json!({ "tries": outcome.tries, "found": outcome.found }));
    } else {
        println!("Target found: {}  num_fixations: {}", outcome.found, outcome.tries);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Gsi {
            salmap,
            targmap,
            distmap,
            noise,
        } => {
            log_paths(salmap, targmap, distmap);
            info!("add eps\t{}", noise.add_eps);
            let score = global_saliency_index(
                &salmap.as_path().into(),
                &targmap.as_path().into(),
                &distmap.as_path().into(),
                noise.tie_break(),
            )?;
            print_score(cli.json, "GSI", score);
        }
        Command::MsrTarg(args) => {
            log_paths(&args.salmap, &args.targmap, &args.distmap);
            let score = max_saliency_ratio_target(
                &args.salmap.as_path().into(),
                &args.targmap.as_path().into(),
                &args.distmap.as_path().into(),
                &score_options(args),
            )?;
            print_score(cli.json, "MSR_targ", score);
        }
        Command::MsrBg(args) => {
            log_paths(&args.salmap, &args.targmap, &args.distmap);
            let score = max_saliency_ratio_background(
                &args.salmap.as_path().into(),
                &args.targmap.as_path().into(),
                &args.distmap.as_path().into(),
                &score_options(args),
            )?;
            print_score(cli.json, "MSR_bg", score);
        }
        Command::Numfix(args) => numfix(args, cli.json)?,
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        error!("{}", err);
        std::process::exit(1);
    }
}
