pub use shared::{
    AlgorithmStep, ApiError, Coordinate, CustomRouteRequest, GeoNode, GraphMode, NearbyNode,
    NearbyQuery, NodeId, RouteRequest, RouteResponse, StepAction, StreetEdge,
};
