use crate::core::PressureController;
use crate::domain::model::TargetReport;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

/// Runs a controller to a target pressure with phase logging and optional
/// process monitoring around it.
pub struct ControlEngine<C: PressureController> {
    controller: C,
    monitor: SystemMonitor,
}

impl<C: PressureController> ControlEngine<C> {
    pub fn new(controller: C) -> Self {
        Self {
            controller,
            monitor: SystemMonitor::new(false),
        }
    }

    pub fn new_with_monitoring(controller: C, monitor_enabled: bool) -> Self {
        Self {
            controller,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&mut self, target: f64) -> Result<TargetReport> {
        tracing::info!("Starting pressure control");
        self.monitor.log_stats("Startup");

        let initial = self.controller.current_pressure().await?;
        tracing::info!("Initial reading: {:.2}", initial);
        self.monitor.log_stats("Initial reading");

        let report = self.controller.reach_target(target).await?;
        self.monitor.log_stats("Control loop");

        tracing::info!(
            "Reached {:.2} (target {}) in {} rounds, {} inflations, {} deflations, {:.1}s of valve time",
            report.final_pressure,
            report.target,
            report.rounds,
            report.inflations,
            report.deflations,
            report.actuation_secs
        );
        self.monitor.log_final_stats();

        Ok(report)
    }

    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }
}
