//! Классификация коэффициента скорости

use crate::config::SpeedBand;
use crate::error::{NarrationError, Result};

/// Результат классификации фрагмента
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    /// Отношение длительности фрагмента к длительности слота
    pub speed_factor: f64,
    /// Лежит ли коэффициент в диапазоне (границы включительно)
    pub in_band: bool,
}

/// Вычисляет коэффициент скорости и сравнивает его с диапазоном.
///
/// Чистая функция. Неположительная длительность слота означает ошибку во
/// входных данных и возвращается сразу.
pub fn classify(clip_duration: f64, slot_duration: f64, band: SpeedBand) -> Result<Classification> {
    if !slot_duration.is_finite() || slot_duration <= 0.0 {
        return Err(NarrationError::config(format!(
            "slot duration must be positive, got {}",
            slot_duration
        )));
    }
    if !clip_duration.is_finite() || clip_duration < 0.0 {
        return Err(NarrationError::config(format!(
            "clip duration must be non-negative, got {}",
            clip_duration
        )));
    }

    let speed_factor = clip_duration / slot_duration;
    Ok(Classification {
        speed_factor,
        in_band: band.contains(speed_factor),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slower_than_slot_needs_fix() {
        let c = classify(9.0, 10.0, SpeedBand::INITIAL).unwrap();
        assert!((c.speed_factor - 0.9).abs() < 1e-12);
        assert!(!c.in_band);
    }

    #[test]
    fn test_exact_slot_accepted_on_initial_pass() {
        let c = classify(10.0, 10.0, SpeedBand::INITIAL).unwrap();
        assert_eq!(c.speed_factor, 1.0);
        assert!(c.in_band);

        // После коррекции 1.0 уже не принимается
        assert!(!classify(10.0, 10.0, SpeedBand::CORRECTION).unwrap().in_band);
    }

    #[test]
    fn test_band_edges_are_inclusive() {
        // 1.1 и 1.5 представимы через деление без потери точности
        let lower = classify(11.0, 10.0, SpeedBand::CORRECTION).unwrap();
        let upper = classify(15.0, 10.0, SpeedBand::CORRECTION).unwrap();
        assert!(lower.in_band, "factor {}", lower.speed_factor);
        assert!(upper.in_band, "factor {}", upper.speed_factor);
        assert!(!classify(15.1, 10.0, SpeedBand::CORRECTION).unwrap().in_band);
    }

    #[test]
    fn test_too_fast_needs_fix() {
        let c = classify(18.0, 10.0, SpeedBand::INITIAL).unwrap();
        assert!((c.speed_factor - 1.8).abs() < 1e-12);
        assert!(!c.in_band);
    }

    #[test]
    fn test_classify_is_pure() {
        let first = classify(13.0, 10.0, SpeedBand::CORRECTION).unwrap();
        let second = classify(13.0, 10.0, SpeedBand::CORRECTION).unwrap();
        assert_eq!(first, second);
        assert!(first.in_band);
    }

    #[test]
    fn test_non_positive_slot_is_rejected() {
        assert!(matches!(
            classify(1.0, 0.0, SpeedBand::INITIAL),
            Err(NarrationError::Config(_))
        ));
        assert!(classify(1.0, -2.0, SpeedBand::INITIAL).is_err());
        assert!(classify(1.0, f64::NAN, SpeedBand::INITIAL).is_err());
    }
}
