//! Expansion of the VIP configuration space into ordered scenarios.

use probe_types::{AddressStyle, NetworkMode, Scenario, DEFAULT_BASE_PORT};
use serde::{Deserialize, Serialize};

/// The axes scenarios are drawn from.
///
/// Iteration order, outermost first: address style, co-location, primary
/// mode, secondary mode. Indices are assigned in that order after
/// `excluded_pairs` has been applied, so they stay contiguous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerationSpace {
    /// Address styles to exercise.
    pub address_styles: Vec<AddressStyle>,
    /// Co-location values to exercise.
    pub co_location: Vec<bool>,
    /// Network modes for the origin workload.
    pub primary_modes: Vec<NetworkMode>,
    /// Network modes for the proxy workload.
    pub secondary_modes: Vec<NetworkMode>,
    /// Port of scenario 0; scenario `i` uses `base_port + i`.
    pub base_port: u16,
    /// (primary, secondary) pairings the platform does not support.
    pub excluded_pairs: Vec<(NetworkMode, NetworkMode)>,
}

impl Default for EnumerationSpace {
    fn default() -> Self {
        Self {
            address_styles: vec![AddressStyle::ip(), AddressStyle::named()],
            co_location: vec![true, false],
            primary_modes: NetworkMode::ALL.to_vec(),
            secondary_modes: NetworkMode::ALL.to_vec(),
            base_port: DEFAULT_BASE_PORT,
            excluded_pairs: Vec::new(),
        }
    }
}

impl EnumerationSpace {
    fn is_excluded(&self, primary: NetworkMode, secondary: NetworkMode) -> bool {
        self.excluded_pairs
            .iter()
            .any(|&(p, s)| p == primary && s == secondary)
    }
}

/// Produces the ordered scenario list for a space.
#[derive(Debug, Clone, Default)]
pub struct ScenarioEnumerator {
    space: EnumerationSpace,
}

impl ScenarioEnumerator {
    /// Enumerator over `space`.
    pub fn new(space: EnumerationSpace) -> Self {
        Self { space }
    }

    /// The space being enumerated.
    pub fn space(&self) -> &EnumerationSpace {
        &self.space
    }

    /// Every scenario in the space, indexed from zero in enumeration order.
    pub fn enumerate(&self) -> Vec<Scenario> {
        let space = &self.space;
        let mut scenarios = Vec::new();

        for style in &space.address_styles {
            for &co_located in &space.co_location {
                for &primary in &space.primary_modes {
                    for &secondary in &space.secondary_modes {
                        if space.is_excluded(primary, secondary) {
                            continue;
                        }
                        let index = scenarios.len();
                        let port = port_for(space.base_port, index);
                        scenarios.push(Scenario::new(
                            index, style, port, co_located, primary, secondary,
                        ));
                    }
                }
            }
        }

        scenarios
    }
}

fn port_for(base: u16, index: usize) -> u16 {
    u16::try_from(index)
        .ok()
        .and_then(|i| base.checked_add(i))
        .unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_space_has_36_scenarios() {
        let scenarios = ScenarioEnumerator::default().enumerate();
        assert_eq!(scenarios.len(), 36);
        for (i, s) in scenarios.iter().enumerate() {
            assert_eq!(s.index(), i);
        }
    }

    #[test]
    fn enumeration_is_deterministic() {
        let a = ScenarioEnumerator::new(EnumerationSpace::default()).enumerate();
        let b = ScenarioEnumerator::new(EnumerationSpace::default()).enumerate();
        assert_eq!(a, b);
        let seeds_a: Vec<u64> = a.iter().map(|s| s.seed()).collect();
        let seeds_b: Vec<u64> = b.iter().map(|s| s.seed()).collect();
        assert_eq!(seeds_a, seeds_b);
    }

    #[test]
    fn nesting_order_is_style_colocation_primary_secondary() {
        let scenarios = ScenarioEnumerator::default().enumerate();

        let first = &scenarios[0];
        assert_eq!(first.service_address(), "1.1.1.0:7000");
        assert!(first.co_located());
        assert_eq!(first.primary(), NetworkMode::User);
        assert_eq!(first.secondary(), NetworkMode::User);

        assert_eq!(scenarios[1].secondary(), NetworkMode::Bridge);
        assert_eq!(scenarios[3].primary(), NetworkMode::Bridge);
        assert!(!scenarios[9].co_located());

        let named = &scenarios[18];
        assert_eq!(named.service_address(), "/namedvip18:7018");
        assert_eq!(
            named.routable_address(),
            "namedvip18.marathon.l4lb.thisdcos.directory:7018"
        );
        assert!(named.co_located());
    }

    #[test]
    fn excluded_pairs_are_filtered_and_indices_stay_contiguous() {
        let space = EnumerationSpace {
            excluded_pairs: vec![(NetworkMode::Host, NetworkMode::User)],
            ..EnumerationSpace::default()
        };
        let scenarios = ScenarioEnumerator::new(space).enumerate();

        assert_eq!(scenarios.len(), 32);
        assert!(scenarios
            .iter()
            .all(|s| !(s.primary() == NetworkMode::Host && s.secondary() == NetworkMode::User)));
        for (i, s) in scenarios.iter().enumerate() {
            assert_eq!(s.index(), i);
            assert_eq!(s.service_address().rsplit(':').next(), Some(&*(7000 + i).to_string()));
        }
    }

    #[test]
    fn port_saturates_instead_of_wrapping() {
        assert_eq!(port_for(7000, 5), 7005);
        assert_eq!(port_for(u16::MAX - 1, 10), u16::MAX);
        assert_eq!(port_for(7000, usize::MAX), u16::MAX);
    }
}
