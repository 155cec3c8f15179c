use std::io;

#[allow(dead_code)]
#[path = "../grid.rs"]
mod grid;
#[allow(dead_code)]
#[path = "../scheduler.rs"]
mod scheduler;
#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    record_profile(TranscriptProfile::Slip)?;
    record_profile(TranscriptProfile::Matched)?;
    record_profile(TranscriptProfile::Jammed)?;
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let mut session = Session::new(profile)?;
    let script: &[&str] = match profile {
        TranscriptProfile::Slip => &[
            "status",
            "set frequency_tolerance 0.01",
            "arm",
            "run 20s",
            "status",
            "run 10s",
            "status",
        ],
        TranscriptProfile::Matched => &[
            "help",
            "help set",
            "set metrics_period 0",
            "arm",
            "run 3s",
            "status",
            "arm",
        ],
        TranscriptProfile::Jammed => &["arm", "run 3s", "status", "disarm", "run 0s"],
    };

    for line in script {
        let _ = session.handle_command(line)?;
    }
    Ok(())
}
