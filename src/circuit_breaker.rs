use failsafe::{
    backoff::{self, Exponential},
    failure_policy::{self, ConsecutiveFailures},
    Config, StateMachine,
};
use std::time::Duration;

/// Circuit breaker type shared by all identity provider calls.
pub type ProviderCircuitBreaker = StateMachine<ConsecutiveFailures<Exponential>, ()>;

/// Creates a circuit breaker for identity provider calls.
///
/// # Configuration
///
/// - **Failure threshold**: 5 consecutive failures triggers OPEN state.
/// - **Backoff**: Exponential backoff from 10s to 60s before attempting recovery.
///
/// While OPEN, calls fail fast and every access check resolves to a login redirect.
///
/// # Example
///
/// ```rust
/// use banking_gate::circuit_breaker::create_provider_circuit_breaker;
/// use failsafe::futures::CircuitBreaker;
///
/// # async fn run() {
/// let circuit_breaker = create_provider_circuit_breaker();
/// let result = circuit_breaker.call(async { Ok::<_, ()>(1) }).await;
/// assert!(result.is_ok());
/// # }
/// ```
pub fn create_provider_circuit_breaker() -> ProviderCircuitBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(10), // Initial delay
        Duration::from_secs(60), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(5, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}
