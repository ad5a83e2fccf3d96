//! Link-time service discovery.
//!
//! [`register_service!`](crate::register_service) places a
//! [`DiscoveredService`] into the [`DISCOVERED_SERVICES`] distributed slice.
//! [`ServiceCollection::discover`] later walks the slice, optionally limited
//! to one module subtree, and registers every entry it finds.
//!
//! ```rust,ignore
//! pub struct MemberLogging;
//!
//! register_service!(MemberLogging, service, handles [MemberJoinedEvent, MemberLeftEvent]);
//! register_service!(CyclingActivity, service, scheduled);
//! ```

use linkme::distributed_slice;
use tracing::debug;

use super::ServiceCollection;

/// One link-time registration.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveredService {
    /// `module_path!()` at the registration site.
    pub module_path: &'static str,
    /// The registered type as written at the registration site.
    pub type_name: &'static str,
    /// Adds the type and its capabilities to a collection.
    pub register: fn(&mut ServiceCollection),
}

impl DiscoveredService {
    /// Whether this entry lives in `root` or one of its submodules.
    pub fn is_under(&self, root: &str) -> bool {
        match self.module_path.strip_prefix(root) {
            Some(rest) => rest.is_empty() || rest.starts_with("::"),
            None => false,
        }
    }
}

/// Every service registered with [`register_service!`](crate::register_service)
/// in the final binary.
#[distributed_slice]
pub static DISCOVERED_SERVICES: [DiscoveredService];

impl ServiceCollection {
    /// Registers every discovered service under `root` (a module path such as
    /// `my_bot` or `my_bot::services`), or every discovered service when
    /// `root` is `None`. Returns the number of entries registered.
    ///
    /// Entries are visited sorted by module path and type name so that
    /// handler and initializer order does not depend on link order.
    pub fn discover(&mut self, root: Option<&str>) -> usize {
        let mut entries: Vec<&DiscoveredService> = DISCOVERED_SERVICES
            .iter()
            .filter(|entry| root.is_none_or(|root| entry.is_under(root)))
            .collect();
        entries.sort_by_key(|entry| (entry.module_path, entry.type_name));

        for entry in &entries {
            debug!(
                module = entry.module_path,
                service = entry.type_name,
                "Registering discovered service"
            );
            (entry.register)(self);
        }
        entries.len()
    }
}

/// Registers a type for link-time discovery.
///
/// The type must implement [`FromServices`](crate::FromServices). Options
/// after the type declare its capabilities:
///
/// - `service`: call [`Service::initialize`](crate::Service::initialize) at startup
/// - `scheduled`: start it as a [`ScheduledTask`](crate::ScheduledTask)
/// - `handles [A, B, ...]`: bind it as a [`Handler`](crate::Handler) for each
///   listed event payload type
///
/// ```rust,ignore
/// register_service!(MemberLogging, service, handles [MemberJoinedEvent, MemberLeftEvent]);
/// ```
#[macro_export]
macro_rules! register_service {
    ($ty:ty $(, $($options:tt)+)?) => {
        const _: () = {
            #[$crate::linkme::distributed_slice($crate::service::DISCOVERED_SERVICES)]
            #[linkme(crate = $crate::linkme)]
            static DISCOVERED: $crate::service::DiscoveredService =
                $crate::service::DiscoveredService {
                    module_path: ::core::module_path!(),
                    type_name: ::core::stringify!($ty),
                    register: |services: &mut $crate::service::ServiceCollection| {
                        $crate::__register_service_options!(
                            services.add_singleton::<$ty>(); $($($options)+)?
                        );
                    },
                };
        };
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __register_service_options {
    ($registration:expr ;) => {
        let _ = $registration;
    };
    ($registration:expr ; service $(, $($rest:tt)*)?) => {
        $crate::__register_service_options!(
            $registration.initializable() ; $($($rest)*)?
        )
    };
    ($registration:expr ; scheduled $(, $($rest:tt)*)?) => {
        $crate::__register_service_options!(
            $registration.scheduled() ; $($($rest)*)?
        )
    };
    ($registration:expr ; handles [$($event:ty),* $(,)?] $(, $($rest:tt)*)?) => {
        $crate::__register_service_options!(
            $registration $(.handles::<$event>())* ; $($($rest)*)?
        )
    };
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::capability::{Handler, ScheduledTask, Service};
    use crate::error::BoxError;
    use crate::event::EventKind;
    use crate::event::payload::{MemberJoinedEvent, MemberLeftEvent};
    use crate::service::{FromServices, ServiceProvider};

    struct Welcomer;

    impl FromServices for Welcomer {
        fn from_services(_: &ServiceProvider) -> Result<Self, BoxError> {
            Ok(Welcomer)
        }
    }

    impl Service for Welcomer {}

    #[async_trait]
    impl Handler<MemberJoinedEvent> for Welcomer {
        async fn handle(&self, _: &MemberJoinedEvent) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[async_trait]
    impl Handler<MemberLeftEvent> for Welcomer {
        async fn handle(&self, _: &MemberLeftEvent) -> Result<(), BoxError> {
            Ok(())
        }
    }

    struct Ticker;

    impl FromServices for Ticker {
        fn from_services(_: &ServiceProvider) -> Result<Self, BoxError> {
            Ok(Ticker)
        }
    }

    #[async_trait]
    impl ScheduledTask for Ticker {
        fn interval(&self) -> std::time::Duration {
            std::time::Duration::from_secs(1)
        }

        async fn invoke(&self) -> Result<(), BoxError> {
            Ok(())
        }
    }

    struct Plain;

    impl FromServices for Plain {
        fn from_services(_: &ServiceProvider) -> Result<Self, BoxError> {
            Ok(Plain)
        }
    }

    crate::register_service!(Welcomer, service, handles [MemberJoinedEvent, MemberLeftEvent]);
    crate::register_service!(Ticker, scheduled);
    crate::register_service!(Plain);

    const HERE: &str = module_path!();

    #[test]
    fn test_module_prefix_matching() {
        let entry = DiscoveredService {
            module_path: "bot::services",
            type_name: "X",
            register: |_| {},
        };
        assert!(entry.is_under("bot"));
        assert!(entry.is_under("bot::services"));
        assert!(!entry.is_under("bo"));
        assert!(!entry.is_under("bot::services::inner"));
    }

    #[test]
    fn test_discovers_registered_types_with_capabilities() {
        let mut services = ServiceCollection::new();
        assert_eq!(services.discover(Some(HERE)), 3);

        let descriptors = services.descriptors();
        let names: Vec<_> = descriptors.iter().map(|d| d.name).collect();
        assert_eq!(names, ["Plain", "Ticker", "Welcomer"]);

        let welcomer = &descriptors[2];
        assert!(welcomer.initializable);
        assert_eq!(
            welcomer.handles,
            vec![EventKind::MemberJoined, EventKind::MemberLeft]
        );
        assert!(descriptors[1].scheduled);
        assert!(!descriptors[0].initializable);
    }

    #[test]
    fn test_discovery_outside_root_finds_nothing() {
        let mut services = ServiceCollection::new();
        assert_eq!(services.discover(Some("no_such_crate")), 0);
        assert!(services.is_empty());
    }

    #[test]
    fn test_discovering_twice_keeps_one_registration_per_type() {
        let mut services = ServiceCollection::new();
        services.discover(Some(HERE));
        services.discover(None);
        let welcomers = services
            .descriptors()
            .into_iter()
            .filter(|d| d.name == "Welcomer")
            .count();
        assert_eq!(welcomers, 1);
    }
}
