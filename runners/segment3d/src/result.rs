//! 运行结果.

use stack_berry::pipeline::{FileOutcome, FileReport, RunSummary};
use std::io::{self, Write};

/// 将单个文件的报告写进 `w` 中.
fn describe_into<W: Write>(r: &FileReport, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn usize_to_display(u: Option<usize>) -> String {
        match u {
            Some(u) => u.to_string(),
            None => "/".to_string(),
        }
    }

    let name = r.file_name();
    match &r.outcome {
        FileOutcome::Processed(p) => {
            writeln!(w, "File `{name}`: processed")?;
            writeln!(w, "{S4}Threshold level: {}", p.threshold.level)?;
            writeln!(w, "{S4}Components labeled: {}", p.labels_found)?;
            writeln!(w, "{S4}Removed at border: {}", p.border_removed)?;
            writeln!(w, "{S4}Regions in table: {}", usize_to_display(p.regions))?;
            write!(w, "{S4}Mask: {}", p.outputs.mask.display())?;
        }
        FileOutcome::Skipped(e) => write!(w, "File `{name}`: skipped\n{S4}{e}")?,
        FileOutcome::Failed(e) => write!(w, "File `{name}`: FAILED\n{S4}{e}")?,
        FileOutcome::NotStarted => write!(w, "File `{name}`: not started (cancelled)")?,
    }
    Ok(())
}

/// 将整次运行的汇总写进 `w` 中.
pub fn summarize_into<W: Write>(s: &RunSummary, w: &mut W) -> io::Result<()> {
    utils::sep_to(&mut *w)?;
    for r in s.reports() {
        describe_into(r, w)?;
        writeln!(w)?;
        utils::sep_to(&mut *w)?;
    }
    writeln!(w, "Input directory: {}", s.input_dir().display())?;
    write!(
        w,
        "Processed: {}, skipped: {}, failed: {}, not started: {}",
        s.processed(),
        s.skipped(),
        s.failed(),
        s.not_started()
    )?;
    Ok(())
}

/// 在标准输出打印汇总.
pub fn print_summary(s: &RunSummary) {
    let mut buf = Vec::with_capacity(512);
    match summarize_into(s, &mut buf) {
        Ok(()) => println!("{}", String::from_utf8_lossy(&buf)),
        Err(e) => log::error!("无法生成运行汇总: {e}"),
    }
}
