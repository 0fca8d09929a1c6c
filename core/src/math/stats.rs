/// NaN-aware summary statistics. Non-finite inputs are skipped everywhere.
pub struct StatsHelper;

impl StatsHelper {
    fn finite<I: IntoIterator<Item = f64>>(values: I) -> Vec<f64> {
        values.into_iter().filter(|v| v.is_finite()).collect()
    }

    pub fn nanmedian<I: IntoIterator<Item = f64>>(values: I) -> f64 {
        let mut finite = Self::finite(values);
        if finite.is_empty() {
            return f64::NAN;
        }
        finite.sort_by(f64::total_cmp);
        let mid = finite.len() / 2;
        if finite.len() % 2 == 0 {
            0.5 * (finite[mid - 1] + finite[mid])
        } else {
            finite[mid]
        }
    }

    pub fn nanmean<I: IntoIterator<Item = f64>>(values: I) -> f64 {
        let (sum, count) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
        if count == 0 {
            f64::NAN
        } else {
            sum / count as f64
        }
    }

    /// Sample standard deviation; NaN with fewer than two finite values.
    pub fn nanstd<I: IntoIterator<Item = f64>>(values: I) -> f64 {
        let finite = Self::finite(values);
        if finite.len() < 2 {
            return f64::NAN;
        }
        let mean = finite.iter().sum::<f64>() / finite.len() as f64;
        let ss: f64 = finite.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (finite.len() - 1) as f64).sqrt()
    }

    pub fn nanmax<I: IntoIterator<Item = f64>>(values: I) -> f64 {
        values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(f64::NAN, f64::max)
    }

    pub fn count_finite<I: IntoIterator<Item = f64>>(values: I) -> usize {
        values.into_iter().filter(|v| v.is_finite()).count()
    }

    /// Pearson correlation over the pairs where both values are finite.
    /// Returns the coefficient and the number of pairs used.
    pub fn pearson<I: IntoIterator<Item = (f64, f64)>>(pairs: I) -> (f64, usize) {
        let pairs: Vec<(f64, f64)> = pairs
            .into_iter()
            .filter(|(a, b)| a.is_finite() && b.is_finite())
            .collect();
        let n = pairs.len();
        if n < 2 {
            return (f64::NAN, n);
        }
        let mean_a = pairs.iter().map(|p| p.0).sum::<f64>() / n as f64;
        let mean_b = pairs.iter().map(|p| p.1).sum::<f64>() / n as f64;
        let (mut sab, mut saa, mut sbb) = (0.0, 0.0, 0.0);
        for (a, b) in &pairs {
            let da = a - mean_a;
            let db = b - mean_b;
            sab += da * db;
            saa += da * da;
            sbb += db * db;
        }
        if saa <= 0.0 || sbb <= 0.0 {
            return (f64::NAN, n);
        }
        ((sab / (saa * sbb).sqrt()).clamp(-1.0, 1.0), n)
    }
}
