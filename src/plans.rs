// src/plans.rs
use crate::models::Plan;

pub const FREE_PLAN_ID: &str = "free";

const BUILTIN_PLANS: [Plan; 4] = [
    Plan {
        id: FREE_PLAN_ID,
        name: "Free Starter",
        price: 0.0,
        daily_earnings: 0.10,
        hash_rate: "1 TH/s",
        duration: 30,
        features: &[
            "Basic mining power",
            "30-day contract",
            "Email support",
            "Real-time stats",
        ],
        popular: false,
    },
    Plan {
        id: "basic",
        name: "Basic Miner",
        price: 45.0,
        daily_earnings: 17.2,
        hash_rate: "25 TH/s",
        duration: 90,
        features: &[
            "Enhanced mining power",
            "90-day contract",
            "Priority support",
            "Advanced analytics",
            "Mobile app access",
        ],
        popular: false,
    },
    Plan {
        id: "pro",
        name: "Pro Miner",
        price: 100.0,
        daily_earnings: 37.0,
        hash_rate: "87.5 TH/s",
        duration: 180,
        features: &[
            "High-performance mining",
            "180-day contract",
            "24/7 support",
            "Premium analytics",
            "API access",
            "Compound earnings",
        ],
        popular: true,
    },
    Plan {
        id: "enterprise",
        name: "Enterprise",
        price: 250.0,
        daily_earnings: 115.4,
        hash_rate: "350 TH/s",
        duration: 365,
        features: &[
            "Maximum mining power",
            "365-day contract",
            "Dedicated support",
            "Custom analytics",
            "White-label access",
            "Auto-reinvestment",
        ],
        popular: false,
    },
];

/// The plan catalog, loaded once at startup and read-only afterwards.
#[derive(Clone, Debug)]
pub struct PlanCatalog {
    plans: Vec<Plan>,
}

impl PlanCatalog {
    pub fn new(plans: Vec<Plan>) -> Self {
        Self { plans }
    }

    pub fn builtin() -> Self {
        Self::new(BUILTIN_PLANS.to_vec())
    }

    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }

    pub fn find(&self, id: &str) -> Option<&Plan> {
        self.plans.iter().find(|p| p.id == id)
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
