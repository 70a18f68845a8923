//! Predictive transforms over a [`Field`].
//!
//! The forward transforms replace every pixel by its residual against a
//! predictor that only sees an untouched copy of the input. The inverse
//! transforms rebuild the field in raster order, so the predictor sees
//! exactly the pixels the encoder's predictor saw.

use crate::error::{Error, Result};
use crate::field::Field;
use crate::predictor::Predictor;

impl Field {
    fn en_transform<P, F>(&mut self, predictor: &mut P, residual: F) -> Result<usize>
    where
        P: Predictor + ?Sized,
        F: Fn(u32, u32) -> u32,
    {
        let mut orig = self.clone();
        predictor.initialize(&mut orig);

        let width = self.width();
        let mut mispredicts = 0;
        for y in 0..self.height() {
            for x in 0..width {
                let p = y * width + x;
                let predicted = predictor.foresee(&orig, x, y, p)?;
                let actual = orig.data()[p];
                if predicted != actual {
                    mispredicts += 1;
                }
                self.data_mut()[p] = residual(actual, predicted);
                predictor.learn(&orig, x, y, p, actual)?;
            }
        }
        Ok(mispredicts)
    }

    fn de_transform<P, F>(&mut self, predictor: &mut P, restore: F) -> Result<()>
    where
        P: Predictor + ?Sized,
        F: Fn(u32, u32) -> u32,
    {
        let residuals = self.data().to_vec();
        let policy = self.out_of_bounds();
        predictor.initialize(self);

        let width = self.width();
        for y in 0..self.height() {
            for x in 0..width {
                let p = y * width + x;
                let predicted = predictor.foresee(self, x, y, p)?;
                let actual = restore(residuals[p], predicted);
                self.data_mut()[p] = actual;
                predictor.learn(self, x, y, p, actual)?;
            }
        }
        self.set_out_of_bounds(policy);
        Ok(())
    }

    /// Replace each pixel by `pixel ^ prediction`.
    ///
    /// Returns the number of mispredicted pixels.
    pub fn prediction_en_transform_xor<P: Predictor + ?Sized>(
        &mut self,
        predictor: &mut P,
    ) -> Result<usize> {
        let mispredicts = self.en_transform(predictor, |actual, predicted| actual ^ predicted)?;
        log::debug!(
            "xor transform of {}x{}: {} mispredicts",
            self.width(),
            self.height(),
            mispredicts
        );
        Ok(mispredicts)
    }

    /// Invert [`Field::prediction_en_transform_xor`] with a fresh predictor of
    /// the same configuration.
    pub fn prediction_de_transform_xor<P: Predictor + ?Sized>(
        &mut self,
        predictor: &mut P,
    ) -> Result<()> {
        self.de_transform(predictor, |residual, predicted| residual ^ predicted)
    }

    /// Replace each pixel by `(pixel - prediction) mod modulus`.
    ///
    /// Pixels must be below `modulus`. Returns the number of mispredicted
    /// pixels.
    pub fn prediction_en_transform_diff<P: Predictor + ?Sized>(
        &mut self,
        predictor: &mut P,
        modulus: u32,
    ) -> Result<usize> {
        if modulus == 0 {
            return Err(Error::InvalidParameter("modulus must be positive"));
        }
        if let Some(&v) = self.data().iter().find(|&&v| v >= modulus) {
            return Err(Error::InvalidSymbol {
                symbol: v,
                alphabet: modulus as usize,
            });
        }
        let mispredicts = self.en_transform(predictor, |actual, predicted| {
            let m = u64::from(modulus);
            ((u64::from(actual) + m - u64::from(predicted) % m) % m) as u32
        })?;
        log::debug!(
            "diff transform of {}x{} mod {}: {} mispredicts",
            self.width(),
            self.height(),
            modulus,
            mispredicts
        );
        Ok(mispredicts)
    }

    /// Invert [`Field::prediction_en_transform_diff`].
    pub fn prediction_de_transform_diff<P: Predictor + ?Sized>(
        &mut self,
        predictor: &mut P,
        modulus: u32,
    ) -> Result<()> {
        if modulus == 0 {
            return Err(Error::InvalidParameter("modulus must be positive"));
        }
        self.de_transform(predictor, |residual, predicted| {
            ((u64::from(residual) + u64::from(predicted)) % u64::from(modulus)) as u32
        })
    }

    /// Replace each pixel by its prediction. Not invertible.
    pub fn prediction<P: Predictor + ?Sized>(&mut self, predictor: &mut P) -> Result<()> {
        self.en_transform(predictor, |_, predicted| predicted)
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use crate::context::FixedSizePredictor;
    use crate::field::Field;
    use crate::hash_context::HashPredictor;
    use crate::predictor::{HorzVertPredictor, MostFrequentPredictor, NullPredictor};

    fn stripes(w: usize, h: usize) -> Field {
        let data = (0..w * h)
            .map(|i| {
                let (x, y) = (i % w, i / w);
                (((x / 3) + (y / 5)) % 4) as u32
            })
            .collect();
        Field::from_data(w, h, data).unwrap()
    }

    #[test]
    fn test_null_xor_is_identity() {
        let f = stripes(7, 5);
        let mut t = f.clone();
        assert_eq!(
            t.prediction_en_transform_xor(&mut NullPredictor).unwrap(),
            f.data().iter().filter(|&&v| v != 0).count()
        );
        assert_eq!(t, f);
    }

    #[test]
    fn test_xor_roundtrip_horz_vert() {
        let f = stripes(17, 11);
        let mut t = f.clone();
        let misses = t.prediction_en_transform_xor(&mut HorzVertPredictor).unwrap();
        assert!(misses < f.len() / 2);
        assert_eq!(t.data().iter().filter(|&&v| v != 0).count(), misses);
        t.prediction_de_transform_xor(&mut HorzVertPredictor).unwrap();
        assert_eq!(t, f);
    }

    #[test]
    fn test_xor_roundtrip_context() {
        let f = stripes(20, 20);
        let mut t = f.clone();
        let mut enc = FixedSizePredictor::new(5, 3, 2, Box::new(HorzVertPredictor)).unwrap();
        t.prediction_en_transform_xor(&mut enc).unwrap();
        let mut dec = FixedSizePredictor::new(5, 3, 2, Box::new(HorzVertPredictor)).unwrap();
        t.prediction_de_transform_xor(&mut dec).unwrap();
        assert_eq!(t, f);
    }

    #[test]
    fn test_xor_roundtrip_hash_restores_policy() {
        let f = stripes(19, 13);
        let mut t = f.clone();
        let mut enc = HashPredictor::new(7, 7, Box::new(HorzVertPredictor)).unwrap();
        t.prediction_en_transform_xor(&mut enc).unwrap();
        assert_eq!(t.out_of_bounds(), f.out_of_bounds());
        let mut dec = HashPredictor::new(7, 7, Box::new(HorzVertPredictor)).unwrap();
        t.prediction_de_transform_xor(&mut dec).unwrap();
        assert_eq!(t, f);
        assert_eq!(t.out_of_bounds(), f.out_of_bounds());
    }

    #[test]
    fn test_diff_roundtrip() {
        let f = stripes(9, 9);
        let mut t = f.clone();
        t.prediction_en_transform_diff(&mut MostFrequentPredictor::new(3), 4)
            .unwrap();
        assert!(t.data().iter().all(|&v| v < 4));
        t.prediction_de_transform_diff(&mut MostFrequentPredictor::new(3), 4)
            .unwrap();
        assert_eq!(t, f);
    }

    #[test]
    fn test_diff_rejects_bad_input() {
        let mut f = Field::from_data(2, 1, vec![0, 3]).unwrap();
        assert!(f.prediction_en_transform_diff(&mut NullPredictor, 0).is_err());
        assert!(f.prediction_en_transform_diff(&mut NullPredictor, 3).is_err());
    }

    #[test]
    fn test_prediction_only() {
        let f = Field::from_data(3, 2, vec![1, 1, 1, 1, 1, 1]).unwrap();
        let mut t = f.clone();
        t.prediction(&mut HorzVertPredictor).unwrap();
        // Only the first pixel lacks a filled neighbor.
        assert_eq!(t.data(), &[0, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn test_empty_field() {
        let mut f = Field::new(0, 0);
        assert_eq!(f.prediction_en_transform_xor(&mut HorzVertPredictor).unwrap(), 0);
        f.prediction_de_transform_xor(&mut HorzVertPredictor).unwrap();
    }
}
