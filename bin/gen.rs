use clap::{Arg, Command};
use std::io::{self, Write};

/// Writes a synthetic cycler export to stdout.
fn main() -> anyhow::Result<()> {
    let matches = Command::new("gen")
        .arg(
            Arg::new("rows")
                .long("rows")
                .value_parser(clap::value_parser!(u64))
                .required(true),
        )
        .arg(
            Arg::new("preamble")
                .long("preamble")
                .help("Write equipment banner lines before the header")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("malformed_every")
                .long("malformed-every")
                .help("Truncate every Nth data row so it no longer matches the header")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(Arg::new("delim").long("delim").default_value(","))
        .get_matches();

    let rows: u64 = *matches.get_one("rows").unwrap();
    let preamble = matches.get_flag("preamble");
    let malformed_every = matches.get_one::<u64>("malformed_every").copied();
    let delim = matches.get_one::<String>("delim").unwrap();

    let mut out = io::BufWriter::new(io::stdout().lock());

    if preamble {
        writeln!(&mut out, "Channel{delim}7")?;
        writeln!(&mut out, "Schedule{delim}\"CC-CV 1C, 25 degC\"")?;
        writeln!(&mut out)?;
    }
    let header = [
        "Cycle",
        "Step",
        "Time(s)",
        "Voltage(V)",
        "Current(A)",
        "Capacity(Ah)",
    ];
    writeln!(&mut out, "{}", header.join(delim))?;

    // Deterministic sawtooth: 100 samples per step, 4 steps per cycle
    for i in 0..rows {
        let cycle = i / 400 + 1;
        let step = (i / 100) % 4 + 1;
        let phase = (i % 100) as f64 / 100.0;
        let charging = step % 2 == 1;
        let voltage = if charging { 3.0 + 1.2 * phase } else { 4.2 - 1.2 * phase };
        let current = if charging { 1.5 } else { -1.5 };
        let capacity = 1.5 * phase;

        if malformed_every.is_some_and(|n| n > 0 && (i + 1) % n == 0) {
            writeln!(&mut out, "{cycle}{delim}{step}{delim}{i}")?;
            continue;
        }
        writeln!(
            &mut out,
            "{cycle}{d}{step}{d}{i}{d}{voltage:.4}{d}{current:.3}{d}{capacity:.5}",
            d = delim
        )?;
        if i % 10_000 == 0 {
            out.flush()?;
        } // keep buffers moving on huge runs
    }

    out.flush()?;
    Ok(())
}
