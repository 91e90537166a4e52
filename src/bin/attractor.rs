// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use attractors::{
    accumulate_parallel, render_bytes, to_rgba_bytes, AttractorParameters, Background,
    CancelFlag, DriverConfig, FrameInfo, Outcome, PlaneMapper, Progress, ProgressiveRenderer,
    RunState,
};
use clap::{App, Arg, ArgMatches};
use failure::{format_err, Error};
use image::ColorType;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::str::FromStr;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn parse_pair<T>(s: &str, separator: char) -> Option<(T, T)>
where
    T: FromStr,
{
    match s.find(separator) {
        None => None,
        Some(index) => match (T::from_str(&s[..index]), T::from_str(&s[index + 1..])) {
            (Ok(l), Ok(r)) => Some((l, r)),
            _ => None,
        },
    }
}

fn parse_list<T: FromStr>(s: &str) -> Option<Vec<T>> {
    s.split(',').map(|v| T::from_str(v.trim()).ok()).collect()
}

fn validate_pair<T: FromStr>(s: &str, separator: char, err: &str) -> Result<(), String> {
    match parse_pair::<T>(s, separator) {
        Some(_) => Ok(()),
        None => Err(err.to_string()),
    }
}

fn validate_list<T: FromStr>(s: &str, low: usize, high: usize, err: &str) -> Result<(), String> {
    match parse_list::<T>(s) {
        Some(ref v) if v.len() >= low && v.len() <= high => Ok(()),
        _ => Err(err.to_string()),
    }
}

fn validate_range<T: FromStr + PartialOrd>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

const OUTPUT: &str = "output";
const SIZE: &str = "size";
const ATTRACTOR: &str = "attractor";
const PARAMS: &str = "params";
const COLOR: &str = "color";
const BACKGROUND: &str = "background";
const SCALE: &str = "scale";
const OFFSET: &str = "offset";
const POINTS: &str = "points";
const CHUNK: &str = "chunk";
const DRAW_EVERY: &str = "draw-every";
const THREADS: &str = "threads";
const SEED: &str = "seed";
const LOW_QUALITY: &str = "low-quality";
const FADE_IN: &str = "fade-in";

fn args<'a>() -> ArgMatches<'a> {
    let max_threads = num_cpus::get();

    App::new("attractor")
        .version(attractors::VERSION)
        .author("Elf M. Sternberg <elf.sternberg@gmail.com>")
        .about("Clifford and de Jong attractor renderer")
        .arg(
            Arg::with_name(OUTPUT)
                .required(true)
                .long(OUTPUT)
                .short("o")
                .takes_value(true)
                .help("Output file (PNG)"),
        )
        .arg(
            Arg::with_name(SIZE)
                .long(SIZE)
                .short("s")
                .takes_value(true)
                .default_value("800x800")
                .validator(|s| validate_pair::<u16>(&s, 'x', "Could not parse output image size"))
                .help("Size of output image"),
        )
        .arg(
            Arg::with_name(ATTRACTOR)
                .long(ATTRACTOR)
                .short("a")
                .takes_value(true)
                .default_value("clifford")
                .help("Attractor family: clifford or dejong"),
        )
        .arg(
            Arg::with_name(PARAMS)
                .long(PARAMS)
                .short("p")
                .takes_value(true)
                .allow_hyphen_values(true)
                .default_value("2,-2,1,-1")
                .validator(|s| validate_list::<f64>(&s, 4, 4, "Expected four coefficients a,b,c,d"))
                .help("Attractor coefficients a,b,c,d"),
        )
        .arg(
            Arg::with_name(COLOR)
                .long(COLOR)
                .takes_value(true)
                .default_value("333,100,100")
                .validator(|s| {
                    validate_list::<f64>(&s, 3, 3, "Expected hue,saturation,brightness")
                })
                .help("Attractor color as hue (degrees), saturation and brightness (percent)"),
        )
        .arg(
            Arg::with_name(BACKGROUND)
                .long(BACKGROUND)
                .takes_value(true)
                .default_value("0,0,0,255")
                .validator(|s| validate_list::<i64>(&s, 1, 4, "Expected up to four RGBA components"))
                .help("Background as r,g,b,a"),
        )
        .arg(
            Arg::with_name(SCALE)
                .long(SCALE)
                .takes_value(true)
                .default_value("150")
                .validator(|s| match f64::from_str(&s) {
                    Ok(scale) if scale > 0.0 && scale.is_finite() => Ok(()),
                    Ok(_) => Err("Scale must be positive".to_string()),
                    Err(_) => Err("Could not parse scale".to_string()),
                })
                .help("Pixels per attractor unit"),
        )
        .arg(
            Arg::with_name(OFFSET)
                .long(OFFSET)
                .takes_value(true)
                .allow_hyphen_values(true)
                .default_value("0,0")
                .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse offset"))
                .help("Offset of the attractor from the image center, in pixels"),
        )
        .arg(
            Arg::with_name(POINTS)
                .long(POINTS)
                .short("n")
                .takes_value(true)
                .validator(|s| {
                    validate_range(
                        &s,
                        1u64,
                        std::u64::MAX,
                        "Could not parse point count",
                        "Point count must be at least 1",
                    )
                })
                .help("Total points to plot (default 20000000)"),
        )
        .arg(
            Arg::with_name(CHUNK)
                .long(CHUNK)
                .takes_value(true)
                .validator(|s| {
                    validate_range(
                        &s,
                        1u64,
                        std::u64::MAX,
                        "Could not parse chunk size",
                        "Chunk size must be at least 1",
                    )
                })
                .help("Points per chunk between progress reports"),
        )
        .arg(
            Arg::with_name(DRAW_EVERY)
                .long(DRAW_EVERY)
                .takes_value(true)
                .validator(|s| {
                    validate_range(
                        &s,
                        1u64,
                        std::u64::MAX,
                        "Could not parse draw interval",
                        "Draw interval must be at least 1",
                    )
                })
                .help("Composite an intermediate frame every this many chunks"),
        )
        .arg(
            Arg::with_name(THREADS)
                .long(THREADS)
                .short("t")
                .takes_value(true)
                .default_value("1")
                .validator(move |s| {
                    validate_range(
                        &s,
                        1,
                        max_threads,
                        "Could not parse thread count",
                        &format!("Thread count must be between 1 and {}", max_threads),
                    )
                })
                .help("Number of threads to use in solver"),
        )
        .arg(
            Arg::with_name(SEED)
                .long(SEED)
                .takes_value(true)
                .validator(|s| {
                    u64::from_str(&s)
                        .map(|_| ())
                        .map_err(|_| "Could not parse seed".to_string())
                })
                .help("Seed for the start point and jitter, for repeatable images"),
        )
        .arg(
            Arg::with_name(LOW_QUALITY)
                .long(LOW_QUALITY)
                .help("Flat coloring over a short preview run"),
        )
        .arg(
            Arg::with_name(FADE_IN)
                .long(FADE_IN)
                .help("Fade intermediate frames in as the run progresses"),
        )
        .get_matches()
}

fn value<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<T, Error> {
    matches
        .value_of(name)
        .and_then(|s| T::from_str(s).ok())
        .ok_or_else(|| format_err!("Could not parse --{}", name))
}

fn list<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<Vec<T>, Error> {
    matches
        .value_of(name)
        .and_then(parse_list)
        .ok_or_else(|| format_err!("Could not parse --{}", name))
}

fn parameters(matches: &ArgMatches) -> Result<AttractorParameters, Error> {
    let coefficients = list::<f64>(matches, PARAMS)?;
    let color = list::<f64>(matches, COLOR)?;
    let (left, top) = matches
        .value_of(OFFSET)
        .and_then(|s| parse_pair::<f64>(s, ','))
        .ok_or_else(|| format_err!("Could not parse --{}", OFFSET))?;
    Ok(AttractorParameters {
        kind: value::<String>(matches, ATTRACTOR)?.parse()?,
        a: coefficients[0],
        b: coefficients[1],
        c: coefficients[2],
        d: coefficients[3],
        hue: color[0],
        saturation: color[1],
        brightness: color[2],
        background: Background::from_components(&list::<i64>(matches, BACKGROUND)?),
        scale: value(matches, SCALE)?,
        left,
        top,
    })
}

fn config(matches: &ArgMatches) -> Result<DriverConfig, Error> {
    let mut config = if matches.is_present(LOW_QUALITY) {
        DriverConfig::preview()
    } else {
        DriverConfig::default()
    };
    if matches.is_present(POINTS) {
        config.total_points = value(matches, POINTS)?;
    }
    if matches.is_present(CHUNK) {
        config.points_per_iteration = value(matches, CHUNK)?;
    }
    if matches.is_present(DRAW_EVERY) {
        config.draw_interval = value(matches, DRAW_EVERY)?;
    }
    if matches.is_present(SEED) {
        config.seed = Some(value(matches, SEED)?);
    }
    config.fade_in = matches.is_present(FADE_IN);
    Ok(config)
}

fn run_progressive(
    params: AttractorParameters,
    plane: PlaneMapper,
    config: DriverConfig,
) -> Result<Vec<u8>, Error> {
    let start = match config.seed {
        Some(seed) => RunState::random_start(&mut StdRng::seed_from_u64(seed)),
        None => RunState::random_start(&mut rand::thread_rng()),
    };
    let mut density = vec![0u32; plane.len()];
    let mut image = vec![0u32; plane.len()];
    let mut renderer = ProgressiveRenderer::new(params, plane, config)?;

    let outcome = renderer.run(
        start,
        &mut density,
        &mut image,
        &mut |p: Progress| {
            info!(
                points = p.points_processed,
                total = p.total_points,
                "{:.0}% plotted",
                p.fraction * 100.0
            )
        },
        &CancelFlag::new(),
        &mut |_: &[u32], frame: FrameInfo| {
            info!(
                points = frame.points_processed,
                max_density = frame.max_density,
                "frame composited"
            )
        },
    )?;
    if let Outcome::Cancelled(summary) = outcome {
        warn!(points = summary.points_processed, "render stopped early");
    }
    Ok(to_rgba_bytes(&image))
}

fn run_parallel(
    params: AttractorParameters,
    plane: PlaneMapper,
    config: DriverConfig,
    threads: usize,
) -> Result<Vec<u8>, Error> {
    config.validate()?;
    let pool = accumulate_parallel(
        &params,
        &plane,
        config.total_points,
        threads,
        config.seed,
        &CancelFlag::new(),
    )?;
    if pool.cancelled {
        warn!(points = pool.points_processed, "render stopped early");
    } else {
        info!(
            threads,
            max_density = pool.max_density,
            "accumulation finished"
        );
    }
    let mut image = vec![0u8; plane.len() * 4];
    render_bytes(
        &pool.density,
        pool.max_density,
        &plane,
        config.high_quality,
        &params,
        1.0,
        &mut image,
    )?;
    Ok(image)
}

fn write_image(outfile: &str, pixels: &[u8], plane: &PlaneMapper) -> Result<(), Error> {
    image::save_buffer(
        outfile,
        pixels,
        plane.width() as u32,
        plane.height() as u32,
        ColorType::RGBA(8),
    )?;
    Ok(())
}

fn render(matches: &ArgMatches) -> Result<(), Error> {
    let (width, height) = matches
        .value_of(SIZE)
        .and_then(|s| parse_pair::<u16>(s, 'x'))
        .ok_or_else(|| format_err!("Could not parse image dimensions"))?;
    let params = parameters(matches)?;
    let config = config(matches)?;
    let threads: usize = value(matches, THREADS)?;
    let plane = PlaneMapper::centered(width as usize, height as usize, &params)?;

    info!(
        attractor = params.kind.name(),
        width,
        height,
        points = config.total_points,
        threads,
        "rendering"
    );

    let image = if threads > 1 {
        run_parallel(params, plane, config, threads)?
    } else {
        run_progressive(params, plane, config)?
    };
    let outfile = matches
        .value_of(OUTPUT)
        .ok_or_else(|| format_err!("No output file"))?;
    write_image(outfile, &image, &plane)?;
    info!(outfile, "image written");
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let matches = args();
    if let Err(e) = render(&matches) {
        eprintln!("Render failure: {}", e);
        std::process::exit(1);
    }
}
