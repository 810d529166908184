use crate::wire::HealthRes;

/// Simple health service shared by the REST API and the CLI.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    /// Static method to check health without creating an instance.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "Raccord is alive".into(),
        }
    }
}
