//! Compound processing.
//!
//! Runs every entity's conversion rules against its compound storage once
//! per logic step. Consumption is bounded by what is actually stored and
//! production by remaining capacity, so repeated processing can never mint
//! compounds out of nothing.

use tidepool_entity::container::EntityContainer;

/// Apply each entity's processor to its compound storage.
pub fn update(container: &mut EntityContainer, delta: f32) {
    for entity in container.live_mut() {
        let Some(processor) = entity.processor.clone() else {
            continue;
        };
        let Some(compounds) = entity.compounds.as_mut() else {
            continue;
        };

        for conversion in &processor.conversions {
            let wanted = conversion.rate * delta;
            let consumed = compounds.take(conversion.input, wanted);
            if consumed <= 0.0 {
                continue;
            }
            let produced = compounds.add(conversion.output, consumed * conversion.ratio);
            if produced <= 0.0 {
                // Output storage is full; put the input back rather than
                // burning it.
                compounds.add(conversion.input, consumed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidepool_entity::components::{CompoundId, Compounds, Conversion, Processor};
    use tidepool_entity::entity::Entity;
    use tidepool_entity::math::Vec2;

    const SUGAR: CompoundId = CompoundId(1);
    const ENERGY: CompoundId = CompoundId(2);

    fn converter(rate: f32, ratio: f32) -> Entity {
        let mut compounds = Compounds::new(100.0);
        compounds.add(SUGAR, 10.0);
        Entity::new(Vec2::ZERO)
            .with_compounds(compounds)
            .with_processor(Processor {
                conversions: vec![Conversion {
                    input: SUGAR,
                    output: ENERGY,
                    rate,
                    ratio,
                }],
            })
    }

    #[test]
    fn conversion_consumes_and_produces() {
        let mut container = EntityContainer::new();
        let id = container.add(converter(2.0, 0.5)).unwrap();

        update(&mut container, 1.0);

        let compounds = container.get(id).unwrap().compounds.as_ref().unwrap();
        assert!((compounds.amount(SUGAR) - 8.0).abs() < 1e-4);
        assert!((compounds.amount(ENERGY) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn conversion_is_bounded_by_stored_input() {
        let mut container = EntityContainer::new();
        let id = container.add(converter(1000.0, 1.0)).unwrap();

        update(&mut container, 1.0);

        let compounds = container.get(id).unwrap().compounds.as_ref().unwrap();
        assert_eq!(compounds.amount(SUGAR), 0.0);
        assert!((compounds.amount(ENERGY) - 10.0).abs() < 1e-4);
    }

    #[test]
    fn full_output_refunds_input() {
        let mut container = EntityContainer::new();
        let mut compounds = Compounds::new(10.0);
        compounds.add(SUGAR, 5.0);
        compounds.add(ENERGY, 10.0);
        let id = container
            .add(
                Entity::new(Vec2::ZERO)
                    .with_compounds(compounds)
                    .with_processor(Processor {
                        conversions: vec![Conversion {
                            input: SUGAR,
                            output: ENERGY,
                            rate: 1.0,
                            ratio: 1.0,
                        }],
                    }),
            )
            .unwrap();

        update(&mut container, 1.0);

        let compounds = container.get(id).unwrap().compounds.as_ref().unwrap();
        assert!((compounds.amount(SUGAR) - 5.0).abs() < 1e-4);
        assert_eq!(compounds.amount(ENERGY), 10.0);
    }

    #[test]
    fn entities_without_records_are_skipped() {
        let mut container = EntityContainer::new();
        container.add(Entity::new(Vec2::ZERO)).unwrap();
        // Must not panic or touch anything.
        update(&mut container, 1.0);
    }
}
