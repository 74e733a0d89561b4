//! Search terms per arXiv discipline used by the daily crawl.

pub const KEYWORDS_BY_DISCIPLINE: &[(&str, &[&str])] = &[
    (
        "Computer Science",
        &[
            "artificial intelligence", "machine learning", "deep learning",
            "reinforcement learning", "robotics", "self-driving", "programming language",
            "large language model", "LLM", "natural language processing", "NLP",
            "computer vision", "data mining", "big data", "supervised learning",
            "unsupervised learning", "semi-supervised learning", "meta-learning",
            "explainable AI", "privacy", "federated learning", "digital twin",
            "edge computing", "IoT", "blockchain", "security", "cryptography",
            "quantum computing", "database", "operating system", "knowledge graph",
            "recommender system", "anomaly detection", "simulation", "numerical analysis",
            "optimization", "graph neural network", "GNN",
        ],
    ),
    (
        "Economics",
        &[
            "economics", "public policy", "financial modeling", "algorithmic trading",
            "development studies", "behavioral economics", "game theory", "market design",
            "environmental economics", "health economics", "labor economics",
        ],
    ),
    (
        "Electrical Engineering and Systems Science",
        &[
            "signal processing", "control systems", "embedded systems",
            "wireless communication", "information theory", "circuit design",
            "semiconductor", "analog electronics", "digital electronics", "power systems",
            "smart grid", "electromagnetic field", "sensor networks", "autonomous systems",
            "cyber-physical systems", "renewable energy", "audio and speech processing",
            "image and video processing", "energy harvesting", "vehicular networks", "AIoT",
            "neuromorphic computing", "mixed-signal systems", "power electronics", "5G", "6G",
            "low-power design",
        ],
    ),
    (
        "Mathematics",
        &[
            "graph theory", "algebra", "topology", "geometry", "probability", "statistics",
            "algebraic geometry", "analysis of PDEs", "combinatorics", "mathematics",
            "number theory", "differential equations", "functional analysis",
            "discrete mathematics", "mathematical modeling",
        ],
    ),
    (
        "Physics",
        &[
            "astrophysics", "cosmology", "medical", "plasma", "space", "gravitational wave",
            "dark matter", "nuclear", "ocean", "biological", "microorganisms", "virology",
            "chemical", "solid", "Newtonian", "exoplanet", "galaxy", "condensed matter",
            "nanomaterials", "materials science", "meteorology", "geophysics",
            "climate change", "energy", "solar", "earth", "mesoscale", "nanoscale",
            "statistical mechanics", "electron", "superconductivity",
        ],
    ),
    (
        "Quantitative Biology",
        &[
            "bioinformatics", "genomics", "proteomics", "metabolomics", "gene therapy",
            "epidemiology", "systems biology", "computational biology",
            "single-cell analysis", "CRISPR", "population genetics",
            "computational neuroscience", "molecular dynamics",
        ],
    ),
    (
        "Quantitative Finance",
        &[
            "risk management", "quantitative analysis", "time series", "stochastic modeling",
            "derivatives pricing", "portfolio optimization", "market microstructure",
            "volatility modeling", "option pricing",
        ],
    ),
    (
        "Statistics",
        &[
            "statistical inference", "causal inference", "Bayesian statistics",
            "Monte Carlo simulation", "hierarchical modeling", "survival analysis",
            "methodology",
        ],
    ),
];

/// Every keyword once, in discipline order. Matching ignores ASCII case.
pub fn all_keywords() -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for (_, terms) in KEYWORDS_BY_DISCIPLINE {
        for term in *terms {
            if !keywords.iter().any(|k| k.eq_ignore_ascii_case(term)) {
                keywords.push(term.to_string());
            }
        }
    }
    keywords
}
