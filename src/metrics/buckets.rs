use serde::Serialize;

/// MCB test-current histogram. The last bucket is closed on both ends.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CurrentBuckets {
    #[serde(rename = "50-100")]
    pub b50_100: u64,
    #[serde(rename = "100-200")]
    pub b100_200: u64,
    #[serde(rename = "200-300")]
    pub b200_300: u64,
    #[serde(rename = "300-400")]
    pub b300_400: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    B50To100,
    B100To200,
    B200To300,
    B300To400,
}

/// `None` for currents outside every bucket.
pub fn bucket_for(current: f64) -> Option<Bucket> {
    if (50.0..100.0).contains(&current) {
        Some(Bucket::B50To100)
    } else if (100.0..200.0).contains(&current) {
        Some(Bucket::B100To200)
    } else if (200.0..300.0).contains(&current) {
        Some(Bucket::B200To300)
    } else if (300.0..=400.0).contains(&current) {
        Some(Bucket::B300To400)
    } else {
        None
    }
}

impl CurrentBuckets {
    pub fn add(&mut self, current: f64) {
        match bucket_for(current) {
            Some(Bucket::B50To100) => self.b50_100 += 1,
            Some(Bucket::B100To200) => self.b100_200 += 1,
            Some(Bucket::B200To300) => self.b200_300 += 1,
            Some(Bucket::B300To400) => self.b300_400 += 1,
            None => {}
        }
    }

    pub fn get(&self, bucket: Bucket) -> u64 {
        match bucket {
            Bucket::B50To100 => self.b50_100,
            Bucket::B100To200 => self.b100_200,
            Bucket::B200To300 => self.b200_300,
            Bucket::B300To400 => self.b300_400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaxCurrent {
    pub value: f64,
    pub count: u64,
}

/// Highest current seen and how many records produced exactly that value.
#[derive(Debug, Default)]
pub struct MaxCurrentTracker {
    max: Option<MaxCurrent>,
}

impl MaxCurrentTracker {
    pub fn observe(&mut self, current: f64) {
        if !current.is_finite() {
            return;
        }
        if let Some(max) = self.max.as_mut() {
            if current == max.value {
                max.count += 1;
                return;
            }
            if current < max.value {
                return;
            }
        }
        self.max = Some(MaxCurrent {
            value: current,
            count: 1,
        });
    }

    pub fn finish(self) -> Option<MaxCurrent> {
        self.max
    }
}
