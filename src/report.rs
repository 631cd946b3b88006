//! Plain-text rendering of the system header, progress lines and final report.
//!
//! Rendering functions return strings; the binary decides where they go.

use crate::benchmarks::{RunEvent, SuiteReport, WorkloadKind};
use crate::system_probe::SystemInfo;

const WIDTH: usize = 60;
const PROGRESS_WIDTH: usize = 26;

pub fn header(system: &SystemInfo) -> String {
    let rule = "=".repeat(WIDTH);
    format!(
        "\n{rule}\nACCELERATOR THROUGHPUT BENCHMARK\n{rule}\n\
         OS: {} | RAM: {:.1} GB\n\
         CPU: {} ({})\n\
         GPU: {} | NPU: {}\n{}",
        system.os,
        system.memory_gib(),
        system.processor,
        system.cores_summary(),
        system.device_summary(),
        system.npu_summary(),
        "-".repeat(WIDTH),
    )
}

/// Text for one progress event, or `None` when the event prints nothing.
///
/// `Started` yields an unterminated line such as `[1] CPU BASELINE (FP32)... `
/// that the matching `Finished` completes.
pub fn progress(event: &RunEvent<'_>) -> Option<String> {
    match event {
        RunEvent::Started { index, label, .. } => {
            let prefix = format!("[{}] {}", index, label);
            let dots = PROGRESS_WIDTH.saturating_sub(prefix.len()).max(3);
            Some(format!("{}{} ", prefix, ".".repeat(dots)))
        }
        RunEvent::Quantizing { .. } => Some("\n    ...compressing to INT8 (W8A16)... ".to_string()),
        RunEvent::Finished { score, .. } => Some(match score.unavailable_reason() {
            None => format!("{}\n", score),
            Some(reason) => format!("unavailable ({})\n", reason),
        }),
    }
}

fn summary_name(kind: WorkloadKind) -> &'static str {
    match kind {
        WorkloadKind::MatMulFp32Cpu => "CPU (General Processing):",
        WorkloadKind::MatMulFp16Gpu => "GPU (Graphics / Basic AI):",
        WorkloadKind::ConvStackFp16 => "NPU (High-Precision AI):",
        WorkloadKind::ConvStackInt8 => "NPU (Quantized AI W8A16):",
    }
}

/// Final report with one line per score.
pub fn final_report(report: &SuiteReport) -> String {
    let rule = "=".repeat(WIDTH);
    let mut out = format!("\n{rule}\nTECHNICAL PERFORMANCE REPORT\n{rule}\n");
    for (kind, score) in &report.scores {
        out.push_str(&format!("* {:<32} {}\n", summary_name(*kind), score));
    }
    out.push_str(&"-".repeat(WIDTH));
    out.push('\n');

    if let Some(int8) = report
        .score(WorkloadKind::ConvStackInt8)
        .filter(|score| score.is_available())
    {
        out.push_str(&format!(
            "NOTE: the ~{:.1} {} INT8 result uses uncalibrated weight-only\n\
             quantization (W8A16). Reaching peak W8A8 throughput requires a\n\
             trained model with calibrated activations.\n",
            int8.value, int8.unit
        ));
    }
    out.push_str(&rule);
    out.push('\n');
    out
}
