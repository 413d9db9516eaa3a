//! `benchmark` command: parse and filter throughput over a real log file.
//!
//! Each trial runs the full ingest path (parse, store append, filter
//! match) over every line of the file. The first trial is warmup and is
//! excluded from the statistics.

use super::BenchmarkArgs;
use crate::filter::FilterEngine;
use crate::parser::LineParser;
use crate::record::LineRecord;
use crate::store::CircularStore;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct TrialStats {
    min: Duration,
    max: Duration,
    mean: Duration,
    p50: Duration,
}

pub fn run(args: BenchmarkArgs) -> Result<(), i32> {
    let lines = read_lines(&args.file)?;
    if lines.is_empty() {
        eprintln!("Error: {} contains no lines", args.file.display());
        return Err(1);
    }

    let mut engine = FilterEngine::new();
    if let Err(e) = engine.set_query(&args.query) {
        eprintln!("Error: {}", e);
        return Err(1);
    }

    let trials = args.trials.max(2);
    let mut durations = Vec::with_capacity(trials);
    let mut matches = 0usize;
    for trial in 0..trials {
        let (elapsed, matched) = run_trial(&args.file, &lines, &engine);
        matches = matched;
        // Trial zero is warmup.
        if trial > 0 {
            durations.push(elapsed);
        }
    }

    let stats = compute_stats(&durations);
    let per_sec = if stats.mean.as_secs_f64() > 0.0 {
        (lines.len() as f64 / stats.mean.as_secs_f64()) as u64
    } else {
        0
    };

    println!("file:        {}", args.file.display());
    println!("lines:       {}", lines.len());
    println!("query:       {}", args.query);
    println!("matches:     {}", matches);
    println!("trials:      {} (+1 warmup)", durations.len());
    println!(
        "time:        min {:?}  p50 {:?}  mean {:?}  max {:?}",
        stats.min, stats.p50, stats.mean, stats.max
    );
    println!("throughput:  {} lines/sec", per_sec);
    Ok(())
}

fn read_lines(path: &Path) -> Result<Vec<String>, i32> {
    let file = std::fs::File::open(path).map_err(|e| {
        eprintln!("Error: failed to open {}: {}", path.display(), e);
        1
    })?;
    let reader = BufReader::new(file);
    Ok(reader.lines().map_while(Result::ok).collect())
}

fn run_trial(path: &Path, lines: &[String], engine: &FilterEngine) -> (Duration, usize) {
    let parser = LineParser::new();
    let store = CircularStore::new(lines.len());
    let filtered = CircularStore::new(lines.len());
    let mut matched = 0usize;

    let start = Instant::now();
    for (n, raw) in lines.iter().enumerate() {
        let mut record = LineRecord::new(path, n as u64 + 1, None, raw.clone());
        parser.parse(&mut record);
        let record = Arc::new(record);
        store.append(Arc::clone(&record));
        if engine.matches(&record) {
            filtered.append(record);
            matched += 1;
        }
    }
    (start.elapsed(), matched)
}

fn compute_stats(durations: &[Duration]) -> TrialStats {
    let mut sorted: Vec<Duration> = durations.to_vec();
    sorted.sort();
    let min = *sorted.first().unwrap_or(&Duration::ZERO);
    let max = *sorted.last().unwrap_or(&Duration::ZERO);
    let total: Duration = sorted.iter().sum();
    let mean = if sorted.is_empty() {
        Duration::ZERO
    } else {
        total / sorted.len() as u32
    };
    let p50 = sorted
        .get(sorted.len() / 2)
        .copied()
        .unwrap_or(Duration::ZERO);
    TrialStats {
        min,
        max,
        mean,
        p50,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_benchmark_runs_on_small_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bench.log");
        let mut f = std::fs::File::create(&path).unwrap();
        for n in 0..200 {
            if n % 10 == 0 {
                writeln!(f, r#"{{"level":"error","n":{}}}"#, n).unwrap();
            } else {
                writeln!(f, "2024-01-15 14:30:22 INFO line {}", n).unwrap();
            }
        }
        f.flush().unwrap();

        let args = BenchmarkArgs {
            file: path,
            query: "level:ERROR".to_string(),
            trials: 2,
        };
        assert!(run(args).is_ok());
    }

    #[test]
    fn test_benchmark_missing_file_fails() {
        let args = BenchmarkArgs {
            file: "/does/not/exist.log".into(),
            query: "errors".to_string(),
            trials: 2,
        };
        assert_eq!(run(args), Err(1));
    }

    #[test]
    fn test_compute_stats() {
        let durations = vec![
            Duration::from_millis(10),
            Duration::from_millis(30),
            Duration::from_millis(20),
        ];
        let stats = compute_stats(&durations);
        assert_eq!(stats.min, Duration::from_millis(10));
        assert_eq!(stats.max, Duration::from_millis(30));
        assert_eq!(stats.mean, Duration::from_millis(20));
        assert_eq!(stats.p50, Duration::from_millis(20));
    }
}
