#[macro_use]
extern crate prettytable;

use std::error::Error;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::Parser;
use inferno::flamegraph::{from_lines, Options as FlamegraphOptions};
use overview::{
    background_thread_strips, collapse_stacks, cpu_overview, flame_chart_data, EntrySource,
    OverviewOptions, DEFAULT_OVERVIEW_WIDTH, DEFAULT_QUANT_PX,
};
use prettytable::Table;
use tracemodel::{NamedObject, TracingModel};

mod load;
mod render;

use crate::load::{load_model, LoadOpt};

#[derive(Parser, Debug)]
struct SummarizeOpt {
    #[clap(flatten)]
    load: LoadOpt,

    /// Only show the N items with the most self time
    #[clap(long = "top")]
    top: Option<usize>,

    /// Hide items whose self time is below this many milliseconds
    #[clap(long = "min-duration", default_value_t = 0.0)]
    min_duration: f64,

    /// Print the results as JSON
    #[clap(long = "json")]
    json: bool,
}

#[derive(Parser, Debug)]
struct ThreadsOpt {
    #[clap(flatten)]
    load: LoadOpt,
}

#[derive(Parser, Debug)]
struct OverviewOpt {
    #[clap(flatten)]
    load: LoadOpt,

    /// Width of the overview in pixels (one character per pixel of the
    /// thread strips)
    #[clap(long = "width", default_value_t = DEFAULT_OVERVIEW_WIDTH)]
    width: f64,

    /// Width of one CPU sample in pixels
    #[clap(long = "quant-px", default_value_t = DEFAULT_QUANT_PX)]
    quant_px: f64,

    /// Print the samples and bars as JSON
    #[clap(long = "json")]
    json: bool,
}

#[derive(Parser, Debug)]
struct FlamegraphOpt {
    #[clap(flatten)]
    load: LoadOpt,

    /// Where to write the SVG
    #[clap(short = 'o', long = "output", default_value = "trace.svg")]
    output: PathBuf,
}

#[derive(Parser, Debug)]
struct EventsOpt {
    #[clap(flatten)]
    load: LoadOpt,

    /// Write the ingested trace events back out as a JSON array
    #[clap(long = "raw")]
    raw: bool,
}

#[derive(Parser, Debug)]
#[clap(about = "Inspect trace-event recordings")]
enum Opt {
    /// Self time per event name
    #[clap(name = "summarize")]
    Summarize(SummarizeOpt),

    /// Processes and threads in display order
    #[clap(name = "threads")]
    Threads(ThreadsOpt),

    /// CPU utilization of the main thread and activity of the others
    #[clap(name = "overview")]
    Overview(OverviewOpt),

    /// Render the recording as a flame graph
    #[clap(name = "flamegraph")]
    Flamegraph(FlamegraphOpt),

    /// List the events of every thread
    #[clap(name = "events")]
    Events(EventsOpt),
}

fn summarize(opt: &SummarizeOpt) -> Result<(), Box<dyn Error + Send + Sync>> {
    let model = load_model(&opt.load)?;
    let mut results = model.perform_analysis();

    results
        .event_data
        .retain(|data| data.self_time >= opt.min_duration);
    if let Some(top) = opt.top {
        results.event_data.truncate(top);
    }

    if opt.json {
        serde_json::to_writer_pretty(io::stdout().lock(), &results)?;
        println!();
        return Ok(());
    }

    let mut table = Table::new();

    table.add_row(row![
        "Item",
        "Self time",
        "% of total time",
        "Time",
        "Item count",
    ]);

    for data in &results.event_data {
        let percent = if results.total_time > 0.0 {
            data.self_time / results.total_time * 100.0
        } else {
            0.0
        };
        table.add_row(row![
            data.name,
            format!("{:.3}ms", data.self_time),
            format!("{:.3}", percent),
            format!("{:.3}ms", data.time),
            format!("{}", data.invocation_count),
        ]);
    }

    table.printstd();

    println!("Total time: {:.3}ms", results.total_time);

    Ok(())
}

fn threads(opt: &ThreadsOpt) -> Result<(), Box<dyn Error + Send + Sync>> {
    let model = load_model(&opt.load)?;
    let flame_chart = flame_chart_data(&model);

    let mut table = Table::new();
    table.add_row(row!["Process", "Thread", "Events", "Async chains", "Rows"]);

    let headers: Vec<_> = flame_chart
        .entries
        .iter()
        .filter_map(|entry| match entry.source {
            EntrySource::Header { thread } => Some((thread, entry.level)),
            _ => None,
        })
        .collect();

    for process in model.sorted_processes() {
        for thread in process.sorted_threads() {
            let thread_ref = thread.thread_ref();
            // A thread's rows run up to the next thread's header.
            let rows = headers
                .iter()
                .position(|&(header, _)| header == thread_ref)
                .map(|i| {
                    let next = headers
                        .get(i + 1)
                        .map_or(flame_chart.level_count(), |&(_, level)| level);
                    next - headers[i].1
                });

            table.add_row(row![
                process.name(),
                thread.name(),
                format!("{}", thread.events().len()),
                format!("{}", thread.async_events().len()),
                rows.map_or_else(|| "-".to_string(), |rows| rows.to_string()),
            ]);
        }
    }

    table.printstd();

    if let Some(session_id) = model.session_id() {
        println!("Session: {}", session_id);
    }
    if let Some(main) = model.session_main_thread() {
        println!("Main thread: {}", main.name());
    }
    for mismatch in model.session_mismatches() {
        println!("Ignored events of session {}", mismatch);
    }
    println!(
        "Recorded: {:.3}ms .. {:.3}ms",
        model.minimum_record_time(),
        model.maximum_record_time()
    );

    Ok(())
}

fn print_overview(opt: &OverviewOpt) -> Result<(), Box<dyn Error + Send + Sync>> {
    let model = load_model(&opt.load)?;
    let options = OverviewOptions {
        width: opt.width,
        quant_px: opt.quant_px,
    };

    let cpu = cpu_overview(&model, &options);
    let strips = background_thread_strips(&model, &options);

    if opt.json {
        let value = serde_json::json!({
            "cpu": serde_json::to_value(&cpu)?,
            "threads": serde_json::to_value(&strips)?,
        });
        serde_json::to_writer_pretty(io::stdout().lock(), &value)?;
        println!();
        return Ok(());
    }

    match cpu {
        Some(ref cpu) => {
            println!(
                "CPU ({} samples of {:.3}ms)",
                cpu.samples.len(),
                cpu.quant_duration
            );
            for (category, line) in render::cpu_rows(cpu) {
                println!("{:>10} |{}|", category, line);
            }
        }
        None => println!("No main thread activity"),
    }

    let width = opt.width.max(0.0) as usize;
    for strip in &strips {
        println!("{:>10} |{}|", strip.name, render::strip_line(strip, width));
    }

    Ok(())
}

fn flamegraph(opt: &FlamegraphOpt) -> Result<(), Box<dyn Error + Send + Sync>> {
    let model = load_model(&opt.load)?;

    let mut recorded_stacks = collapse_stacks(&model)
        .iter()
        .filter(|&(_, &micros)| micros > 0)
        .map(|(unique_stack, micros)| format!("{} {}", unique_stack, micros))
        .collect::<Vec<_>>();
    recorded_stacks.sort();

    let file = BufWriter::new(File::create(&opt.output)?);
    let mut flamegraph_options = FlamegraphOptions::default();
    flamegraph_options.count_name = "µs".to_string();

    from_lines(
        &mut flamegraph_options,
        recorded_stacks.iter().map(|s| s.as_ref()),
        file,
    )
    .map_err(|e| format!("unable to generate a flamegraph from the collapsed stack data: {}", e))?;

    log::info!("Wrote {}", opt.output.display());

    Ok(())
}

fn print_events(model: &TracingModel, out: &mut impl Write) -> io::Result<()> {
    for process in model.sorted_processes() {
        writeln!(out, "{} (pid {})", process.name(), process.id())?;
        for thread in process.sorted_threads() {
            writeln!(out, "  {} (tid {})", thread.name(), thread.id())?;
            for event in thread.events() {
                match event.duration() {
                    Some(duration) => writeln!(
                        out,
                        "    {:>12.3} {:>10.3}ms {} {}",
                        event.start_time,
                        duration,
                        event.phase.code(),
                        event.name
                    )?,
                    None => writeln!(
                        out,
                        "    {:>12.3} {:>12} {} {}",
                        event.start_time,
                        "",
                        event.phase.code(),
                        event.name
                    )?,
                }
                if let Some(ref warning) = event.warning {
                    writeln!(out, "      ! {}", warning)?;
                }
            }
            for chain in thread.async_events() {
                writeln!(
                    out,
                    "    {:>12.3} async {} ({} steps)",
                    chain.start_time(),
                    chain.name(),
                    chain.steps().len()
                )?;
            }
        }
    }
    Ok(())
}

fn events(opt: &EventsOpt) -> Result<(), Box<dyn Error + Send + Sync>> {
    let model = load_model(&opt.load)?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if opt.raw {
        serde_json::to_writer(&mut out, model.raw_events())?;
        writeln!(out)?;
    } else {
        print_events(&model, &mut out)?;
    }

    out.flush()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let opt = Opt::parse();

    match opt {
        Opt::Summarize(opt) => summarize(&opt),
        Opt::Threads(opt) => threads(&opt),
        Opt::Overview(opt) => print_overview(&opt),
        Opt::Flamegraph(opt) => flamegraph(&opt),
        Opt::Events(opt) => events(&opt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracemodel::testing_common::TraceBuilder;

    #[test]
    fn event_listing() {
        let mut b = TraceBuilder::new();
        b.thread_name(1, 1, "main");
        b.interval(1, 1, "Layout", 1000, 3500, |_| {});
        b.instant(1, 1, "Mark", 4000);
        b.async_begin(1, 1, "Load", "1", 1000);
        b.async_end(1, 1, "Load", "1", 2000);
        let model = b.into_model();

        let mut out = Vec::new();
        print_events(&model, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();

        let lines: Vec<_> = out.lines().map(str::trim).collect();
        assert_eq!(lines[0], "Process 1 (pid 1)");
        assert_eq!(lines[1], "main (tid 1)");
        assert_eq!(lines[2], "1.000      2.500ms B Layout");
        assert!(lines[3].ends_with("i Mark"));
        assert_eq!(lines[4], "1.000 async Load (2 steps)");
    }

    #[test]
    fn command_line() {
        let opt = Opt::try_parse_from([
            "tlview",
            "overview",
            "trace.json",
            "--width",
            "200",
            "--chunk-size",
            "500",
        ])
        .unwrap();
        match opt {
            Opt::Overview(opt) => {
                assert_eq!(opt.width, 200.0);
                assert_eq!(opt.quant_px, DEFAULT_QUANT_PX);
                assert_eq!(opt.load.chunk_size, Some(500));
                assert_eq!(opt.load.file, PathBuf::from("trace.json"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
