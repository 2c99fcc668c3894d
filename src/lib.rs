pub mod configuration;

pub mod manager {
    pub mod namedobject;
    pub mod managererror;
    pub mod manager;
}

pub mod math {
    pub mod round;
    pub mod combinatorics;
    pub mod rootfinding;
}

pub mod rv {
    pub mod engineerror;
    pub mod randomvariable;
    pub mod randomvariablemanager;
    pub mod engine;
    pub mod partition;
    pub mod conversion;
    pub mod transform;

    pub mod combination {
        pub mod combination;
        pub mod convolution;
        pub mod product;
        pub mod extremes;
        pub mod mixture;
    }

    pub mod orderstatistic;
    pub mod moments;
    pub mod iid;
    pub mod sampling;
    pub mod verification;
}

pub mod symbolic {
    pub mod expr;
    pub mod simplify;
    pub mod calculus;
    pub mod summation;
    pub mod solve;
    pub mod parser;
    pub mod backend;
}
