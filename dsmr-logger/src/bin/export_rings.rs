use std::{env, io, path::PathBuf};

use anyhow::{bail, Context, Result};
use dsmr_client::{
    ring_file::queries::{history, load_ring, usage_per_window},
    Decimal3, Granularity,
};

fn delta_cell(value: Option<Decimal3>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let [dir, granularity] = args.as_slice() else {
        bail!("usage: export_rings <data_dir> <hours|days|months>");
    };
    let granularity: Granularity = granularity.parse().map_err(anyhow::Error::msg)?;
    let dir = PathBuf::from(dir);

    let image = load_ring(&dir, granularity)
        .with_context(|| format!("reading {}", dir.join(granularity.file_name()).display()))?;
    if image.discarded > 0 {
        eprintln!("warning: {} unreadable record(s) skipped", image.discarded);
    }

    let mut wtr = csv::Writer::from_writer(io::stdout().lock());
    wtr.write_record([
        granularity.label_column(),
        "window_start",
        "edt1",
        "edt2",
        "ert1",
        "ert2",
        "gdt",
        "d_edt1",
        "d_edt2",
        "d_ert1",
        "d_ert2",
        "d_gdt",
    ])?;

    for row in usage_per_window(granularity, &history(&image.slots)) {
        let r = row.record;
        let d = row.delta;
        wtr.write_record([
            granularity.label_text(r.label).unwrap_or_default(),
            row.window_start.map(|t| t.to_string()).unwrap_or_default(),
            r.edt1.to_string(),
            r.edt2.to_string(),
            r.ert1.to_string(),
            r.ert2.to_string(),
            r.gdt.to_string(),
            delta_cell(d.map(|d| d.edt1)),
            delta_cell(d.map(|d| d.edt2)),
            delta_cell(d.map(|d| d.ert1)),
            delta_cell(d.map(|d| d.ert2)),
            delta_cell(d.map(|d| d.gdt)),
        ])?;
    }
    wtr.flush()?;

    Ok(())
}
